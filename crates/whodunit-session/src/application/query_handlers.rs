//! Query handlers for the session context.
//!
//! Status is a read-only projection of the stored session state. Reading it
//! never takes the session lock and never writes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use whodunit_core::error::DomainError;

use crate::application::state_store::SessionStateStore;
use crate::domain::phase::{self, Effect, Phase, Trigger};
use crate::domain::state::{
    FinalChoice, MissionSubmission, PublicLogEntry, QnaEntry, SessionState,
};

/// Number of public log entries included in a status.
pub const RECENT_LOG_LIMIT: usize = 20;

/// A player as shown in a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    /// Player identifier.
    pub player_id: String,
    /// Occupied character.
    pub character_id: Option<String>,
    /// Questions asked across all acts.
    pub questions_asked: u32,
}

/// A character as shown in a status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterView {
    /// Character identifier.
    pub character_id: String,
    /// Display name.
    pub name: String,
    /// Public description.
    pub description: String,
    /// Avatar asset path.
    pub avatar: Option<String>,
    /// Player occupying the character.
    pub played_by: Option<String>,
    /// Questions the character may still receive this act.
    pub remaining_questions: u32,
}

/// An action that would currently be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum AvailableAction {
    /// The character may give a monologue.
    Monologue {
        /// Character that may speak.
        character_id: String,
    },
    /// The character may be questioned.
    #[serde(rename = "qna")]
    Question {
        /// Character that may be questioned.
        character_id: String,
        /// Questions left for the character this act.
        remaining_questions: u32,
    },
    /// Missions may be submitted.
    MissionSubmit,
    /// The session may move to `target_phase`.
    AdvancePhase {
        /// Phase that would be entered.
        target_phase: Phase,
        /// `true` if entering it begins the next act.
        next_act: bool,
    },
    /// Final accusations may be made.
    FinalChoice,
}

/// Read-only view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    /// Session identifier.
    pub session_id: Uuid,
    /// Script being played.
    pub script_id: String,
    /// Script title.
    pub title: String,
    /// Current act.
    pub current_act: u32,
    /// Last act.
    pub max_acts: u32,
    /// Current phase.
    pub current_phase: Phase,
    /// Player whose turn it is.
    pub current_turn_player: Option<String>,
    /// Joined players in turn order.
    pub players: Vec<PlayerView>,
    /// Characters of the script.
    pub characters: Vec<CharacterView>,
    /// Actions that would be accepted now.
    pub available_actions: Vec<AvailableAction>,
    /// The newest public log entries, oldest first.
    pub recent_log_entries: Vec<PublicLogEntry>,
    /// Full Q&A history, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qna_history: Option<Vec<QnaEntry>>,
    /// All mission submissions, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mission_submissions: Option<Vec<MissionSubmission>>,
    /// All final choices, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_choices: Option<Vec<FinalChoice>>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last changed.
    pub updated_at: DateTime<Utc>,
    /// When the session was completed.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Actions the session would accept right now, derived from the phase graph
/// and the remaining quotas.
#[must_use]
pub fn available_actions(state: &SessionState) -> Vec<AvailableAction> {
    let from = state.current_phase();
    let context = state.transition_context();
    let mut actions = Vec::new();

    if phase::permits(from, Trigger::Monologue, &context) {
        actions.extend(state.characters().keys().map(|character_id| {
            AvailableAction::Monologue {
                character_id: character_id.clone(),
            }
        }));
    }
    if phase::permits(from, Trigger::Question, &context) && !state.players().is_empty() {
        for character_id in state.characters().keys() {
            let remaining_questions = state.quota_remaining(character_id);
            if remaining_questions > 0 {
                actions.push(AvailableAction::Question {
                    character_id: character_id.clone(),
                    remaining_questions,
                });
            }
        }
    }
    if phase::permits(from, Trigger::MissionSubmit, &context) {
        actions.push(AvailableAction::MissionSubmit);
    }
    if phase::permits(from, Trigger::FinalChoice, &context) {
        actions.push(AvailableAction::FinalChoice);
    }
    for target_phase in phase::advance_targets(from, &context) {
        let next_act = phase::resolve(from, Trigger::Advance, Some(target_phase), &context)
            .is_ok_and(|edge| edge.effect == Effect::NextAct);
        actions.push(AvailableAction::AdvancePhase {
            target_phase,
            next_act,
        });
    }
    actions
}

/// Projects `state` into a status view.
#[must_use]
pub fn project_status(state: &SessionState, include_history: bool) -> SessionStatus {
    let players = state
        .turn_order()
        .iter()
        .filter_map(|player_id| state.player(player_id))
        .map(|player| PlayerView {
            player_id: player.player_id.clone(),
            character_id: player.character_id.clone(),
            questions_asked: player.questions_asked,
        })
        .collect();

    let characters = state
        .characters()
        .values()
        .map(|character| CharacterView {
            character_id: character.character_id.clone(),
            name: character.name.clone(),
            description: character.description.clone(),
            avatar: character.avatar.clone(),
            played_by: state
                .players()
                .values()
                .find(|player| player.character_id.as_deref() == Some(&character.character_id))
                .map(|player| player.player_id.clone()),
            remaining_questions: state.quota_remaining(&character.character_id),
        })
        .collect();

    let log = state.public_log();
    let recent_log_entries = log[log.len().saturating_sub(RECENT_LOG_LIMIT)..].to_vec();

    SessionStatus {
        session_id: state.session_id(),
        script_id: state.script_id().to_owned(),
        title: state.title().to_owned(),
        current_act: state.current_act(),
        max_acts: state.max_acts(),
        current_phase: state.current_phase(),
        current_turn_player: state.current_turn_player().map(str::to_owned),
        players,
        characters,
        available_actions: available_actions(state),
        recent_log_entries,
        qna_history: include_history.then(|| state.qna_history().to_vec()),
        mission_submissions: include_history.then(|| state.mission_submissions().to_vec()),
        final_choices: include_history.then(|| state.final_choices().to_vec()),
        created_at: state.created_at(),
        updated_at: state.updated_at(),
        completed_at: state.completed_at(),
    }
}

/// Retrieves the status of a session.
///
/// # Errors
///
/// Returns `DomainError::SessionNotFound` if the session does not exist, or
/// `DomainError::Persistence` if it cannot be loaded.
pub async fn get_status(
    session_id: Uuid,
    include_history: bool,
    store: &SessionStateStore,
) -> Result<SessionStatus, DomainError> {
    let state = store.load(session_id).await?;
    Ok(project_status(&state, include_history))
}
