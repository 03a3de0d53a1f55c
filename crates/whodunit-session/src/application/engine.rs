//! Orchestration engine: the single entry point for session commands.
//!
//! Every mutating command runs under the session's lock against a working
//! copy loaded from the store. The copy is saved before the caller gets an
//! answer; if the save fails the copy is dropped, so the stored snapshot
//! stays the authoritative state. A broadcast takes over the lock after the
//! save and releases it once every recipient has the exchange, so the next
//! action on the session always sees it.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use whodunit_core::clock::Clock;
use whodunit_core::command::Command;
use whodunit_core::error::DomainError;
use whodunit_core::repository::SnapshotRepository;
use whodunit_generation::GenerationAdapter;

use crate::application::broadcast::{BroadcastCoordinator, BroadcastJob};
use crate::application::locks::SessionLocks;
use crate::application::query_handlers::{self, SessionStatus};
use crate::application::state_store::SessionStateStore;
use crate::domain::commands::{Action, JoinSession, StartSession, SubmitAction};
use crate::domain::phase::Phase;
use crate::domain::script::ScriptCatalog;
use crate::domain::state::SessionState;

/// Engine-wide limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Acts per session unless the script sets its own.
    pub max_acts: u32,
    /// Questions each character may receive per act.
    pub qna_limit_per_act: u32,
    /// How long an action waits for a busy session.
    pub lock_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_acts: 3,
            qna_limit_per_act: 3,
            lock_wait: Duration::from_secs(30),
        }
    }
}

/// What an accepted action did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// A character spoke.
    Monologue {
        /// The speaking character.
        character_id: String,
        /// The monologue.
        text: String,
        /// `true` if the text is fallback content.
        degraded: bool,
    },
    /// A question was answered.
    #[serde(rename = "qna")]
    Answer {
        /// The recorded exchange.
        qna_id: Uuid,
        /// The answering character.
        character_id: String,
        /// The answer.
        answer: String,
        /// `true` if the answer is fallback content.
        degraded: bool,
        /// Questions the character may still receive this act.
        remaining_questions: u32,
    },
    /// A mission was recorded.
    MissionSubmit {
        /// The recorded submission.
        submission_id: Uuid,
    },
    /// The session changed phase.
    AdvancePhase {
        /// Phase before the change.
        from: Phase,
        /// Phase after the change.
        to: Phase,
        /// `true` if a new act began.
        act_advanced: bool,
    },
    /// A final accusation was recorded.
    FinalChoice {
        /// The accusing player.
        player_id: String,
        /// The accused character.
        accused_character_id: String,
    },
}

/// Result of an accepted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    /// The session acted on.
    pub session_id: Uuid,
    /// Act after the action.
    pub current_act: u32,
    /// Phase after the action.
    pub current_phase: Phase,
    /// What the action did.
    #[serde(flatten)]
    pub outcome: ActionOutcome,
}

/// Runs commands against sessions.
pub struct SessionEngine {
    catalog: Arc<dyn ScriptCatalog>,
    store: SessionStateStore,
    generation: Arc<GenerationAdapter>,
    locks: SessionLocks,
    broadcasts: BroadcastCoordinator,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl std::fmt::Debug for SessionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEngine")
            .field("config", &self.config)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl SessionEngine {
    /// Creates an engine and starts its broadcast worker. Must be called
    /// inside a Tokio runtime.
    #[must_use]
    pub fn new(
        catalog: Arc<dyn ScriptCatalog>,
        repository: Arc<dyn SnapshotRepository>,
        generation: Arc<GenerationAdapter>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let store = SessionStateStore::new(repository, Arc::clone(&clock));
        let broadcasts = BroadcastCoordinator::spawn(store.clone(), Arc::clone(&clock));
        Self {
            catalog,
            store,
            generation,
            locks: SessionLocks::new(config.lock_wait),
            broadcasts,
            clock,
            config,
        }
    }

    /// The engine's limits.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a session from a script.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` for a blank creator,
    /// `DomainError::ScriptNotFound` for an unknown script, or
    /// `DomainError::Persistence` if the new session cannot be saved.
    #[instrument(
        skip(self, command),
        fields(
            command_type = command.command_type(),
            correlation_id = %command.correlation_id,
            script_id = %command.script_id
        )
    )]
    pub async fn start_session(&self, command: &StartSession) -> Result<SessionStatus, DomainError> {
        if command.creator_id.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "creator id cannot be empty".to_owned(),
            ));
        }
        let script = self
            .catalog
            .find_script(&command.script_id)
            .await?
            .ok_or_else(|| DomainError::ScriptNotFound(command.script_id.clone()))?;

        let session_id = Uuid::new_v4();
        let state = SessionState::start(
            session_id,
            &script,
            &command.creator_id,
            script.max_acts.unwrap_or(self.config.max_acts),
            self.config.qna_limit_per_act,
            self.clock.now(),
        )?;
        self.persist(&state).await?;

        info!(%session_id, max_acts = state.max_acts(), "session started");
        Ok(query_handlers::project_status(&state, false))
    }

    /// Adds a player to a session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SessionBusy`, `DomainError::SessionNotFound`,
    /// any join validation error, or `DomainError::Persistence`.
    #[instrument(
        skip(self, command),
        fields(
            command_type = command.command_type(),
            correlation_id = %command.correlation_id,
            session_id = %command.session_id
        )
    )]
    pub async fn join(&self, command: &JoinSession) -> Result<SessionStatus, DomainError> {
        let _guard = self.locks.acquire(command.session_id).await?;
        let mut state = self.store.load(command.session_id).await?;

        state.join_player(&command.player_id, &command.character_id, self.clock.now())?;
        self.persist(&state).await?;

        info!(
            player_id = %command.player_id,
            character_id = %command.character_id,
            "player joined"
        );
        Ok(query_handlers::project_status(&state, false))
    }

    /// Applies a player action to a session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SessionBusy` if the session stays locked past
    /// the configured wait, `DomainError::SessionNotFound`, any validation
    /// error of the action (the session is left untouched), or
    /// `DomainError::Persistence` if the result cannot be saved.
    #[instrument(
        skip(self, command),
        fields(
            command_type = command.command_type(),
            correlation_id = %command.correlation_id,
            session_id = %command.session_id
        )
    )]
    pub async fn process_action(&self, command: &SubmitAction) -> Result<ActionResult, DomainError> {
        let guard = self.locks.acquire(command.session_id).await?;
        let mut state = self.store.load(command.session_id).await?;

        let (outcome, broadcast) = self
            .apply(&mut state, &command.action)
            .await
            .inspect_err(|err| {
                if err.is_validation() {
                    info!(kind = err.kind(), reason = %err, "action rejected");
                } else {
                    warn!(kind = err.kind(), error = %err, "action failed");
                }
            })?;
        self.persist(&state).await?;
        if let Some(job) = broadcast {
            self.broadcasts.schedule(job, guard);
        }

        info!(
            action_type = command.action.action_type(),
            current_act = state.current_act(),
            current_phase = %state.current_phase(),
            "action accepted"
        );
        Ok(ActionResult {
            session_id: state.session_id(),
            current_act: state.current_act(),
            current_phase: state.current_phase(),
            outcome,
        })
    }

    /// Returns a read-only view of a session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SessionNotFound` or `DomainError::Persistence`.
    #[instrument(skip(self))]
    pub async fn get_status(
        &self,
        session_id: Uuid,
        include_history: bool,
    ) -> Result<SessionStatus, DomainError> {
        query_handlers::get_status(session_id, include_history, &self.store).await
    }

    /// Resolves once every scheduled broadcast has finished.
    pub async fn wait_for_broadcasts(&self) {
        self.broadcasts.wait_idle().await;
    }

    async fn persist(&self, state: &SessionState) -> Result<(), DomainError> {
        self.store.save(state).await.inspect_err(|err| {
            error!(session_id = %state.session_id(), error = %err, "failed to save session");
        })
    }

    async fn apply(
        &self,
        state: &mut SessionState,
        action: &Action,
    ) -> Result<(ActionOutcome, Option<BroadcastJob>), DomainError> {
        let now = self.clock.now();
        match action {
            Action::Monologue { character_id } => {
                let context = state.check_monologue(character_id)?.context();
                let generation = self
                    .generation
                    .monologue(character_id, state.current_act(), context)
                    .await?;
                state.record_monologue(character_id, &generation.text, now)?;
                Ok((
                    ActionOutcome::Monologue {
                        character_id: character_id.clone(),
                        text: generation.text,
                        degraded: generation.degraded,
                    },
                    None,
                ))
            }
            Action::Question {
                questioner_id,
                character_id,
                question_text,
            } => {
                let context = state.check_question(questioner_id, character_id)?.context();
                let generation = self
                    .generation
                    .answer_question(character_id, state.current_act(), question_text, context)
                    .await?;
                let entry = state.record_question(
                    questioner_id,
                    character_id,
                    question_text.trim(),
                    &generation.text,
                    generation.degraded,
                    now,
                )?;
                let recipients = state
                    .characters()
                    .keys()
                    .filter(|id| **id != entry.character_id)
                    .cloned()
                    .collect();
                let outcome = ActionOutcome::Answer {
                    qna_id: entry.qna_id,
                    character_id: entry.character_id.clone(),
                    answer: entry.answer.clone(),
                    degraded: entry.degraded,
                    remaining_questions: state.quota_remaining(character_id),
                };
                let job = BroadcastJob {
                    session_id: state.session_id(),
                    entry,
                    recipients,
                };
                Ok((outcome, Some(job)))
            }
            Action::MissionSubmit {
                player_id,
                category,
                content,
            } => {
                let submission = state.submit_mission(player_id, category, content, now)?;
                Ok((
                    ActionOutcome::MissionSubmit {
                        submission_id: submission.submission_id,
                    },
                    None,
                ))
            }
            Action::AdvancePhase { target_phase } => {
                let change = state.advance_phase(*target_phase, now)?;
                info!(
                    from = %change.from,
                    to = %change.to,
                    current_act = change.current_act,
                    "phase changed"
                );
                Ok((
                    ActionOutcome::AdvancePhase {
                        from: change.from,
                        to: change.to,
                        act_advanced: change.act_advanced,
                    },
                    None,
                ))
            }
            Action::FinalChoice {
                player_id,
                accused_character_id,
            } => {
                let choice = state.record_final_choice(player_id, accused_character_id, now)?;
                Ok((
                    ActionOutcome::FinalChoice {
                        player_id: choice.player_id,
                        accused_character_id: choice.accused_character_id,
                    },
                    None,
                ))
            }
        }
    }
}
