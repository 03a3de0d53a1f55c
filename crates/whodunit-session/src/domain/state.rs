//! Session state: the authoritative record of one game.
//!
//! Fields are private. Read access goes through accessors; every mutator is
//! crate-private and only reachable from the engine's action path. Mutators
//! check their invariants first and fail without touching the state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use whodunit_core::error::DomainError;

use super::phase::{self, Effect, Phase, TransitionContext, Trigger};
use super::script::Script;

/// A participant in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Player identifier.
    pub player_id: String,
    /// Character occupied by the player.
    pub character_id: Option<String>,
    /// When the player joined.
    pub joined_at: DateTime<Utc>,
    /// Questions this player has asked across all acts.
    pub questions_asked: u32,
}

/// A Q&A exchange a character has heard about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryNote {
    /// The exchange this note came from.
    pub qna_id: Uuid,
    /// Character that answered.
    pub answered_by: String,
    /// The question asked.
    pub question: String,
    /// The answer given.
    pub answer: String,
    /// Act of the exchange.
    pub act_number: u32,
    /// When the note was added to this character's memory.
    pub recorded_at: DateTime<Utc>,
}

impl MemoryNote {
    /// Builds the note other characters receive for `entry`.
    #[must_use]
    pub fn from_entry(entry: &QnaEntry, recorded_at: DateTime<Utc>) -> Self {
        Self {
            qna_id: entry.qna_id,
            answered_by: entry.character_id.clone(),
            question: entry.question.clone(),
            answer: entry.answer.clone(),
            act_number: entry.act_number,
            recorded_at,
        }
    }

    /// Renders the note as one line of generation context.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "Act {}: {} was asked \"{}\" and answered \"{}\"",
            self.act_number, self.answered_by, self.question, self.answer
        )
    }
}

/// A character of the script and its conversational memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterState {
    /// Character identifier.
    pub character_id: String,
    /// Display name.
    pub name: String,
    /// Public description.
    pub description: String,
    /// Avatar asset path.
    pub avatar: Option<String>,
    /// Exchanges with other characters this character knows of, oldest first.
    pub memory: Vec<MemoryNote>,
}

impl CharacterState {
    /// Memory rendered as generation context.
    #[must_use]
    pub fn context(&self) -> Vec<String> {
        self.memory.iter().map(MemoryNote::render).collect()
    }
}

/// A question put to a character and its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QnaEntry {
    /// Entry identifier.
    pub qna_id: Uuid,
    /// Player who asked.
    pub questioner_id: String,
    /// Character who answered.
    pub character_id: String,
    /// The question.
    pub question: String,
    /// The answer.
    pub answer: String,
    /// Act of the exchange.
    pub act_number: u32,
    /// `true` if the answer is fallback content.
    pub degraded: bool,
    /// When the exchange was committed.
    pub asked_at: DateTime<Utc>,
}

/// A mission or clue submitted by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionSubmission {
    /// Submission identifier.
    pub submission_id: Uuid,
    /// Submitting player.
    pub player_id: String,
    /// Category tag, such as `evidence` or `accusation`.
    pub category: String,
    /// Free-text content.
    pub content: String,
    /// Act of the submission.
    pub act_number: u32,
    /// When the submission was committed.
    pub submitted_at: DateTime<Utc>,
}

/// A player's final accusation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalChoice {
    /// The accusing player.
    pub player_id: String,
    /// The accused character.
    pub accused_character_id: String,
    /// When the choice was made.
    pub made_at: DateTime<Utc>,
}

/// What a public log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// The session was created.
    SessionCreated,
    /// A player joined.
    PlayerJoined,
    /// A character gave a monologue.
    Monologue,
    /// A question was answered.
    Question,
    /// A mission was submitted.
    MissionSubmitted,
    /// The phase or act changed.
    PhaseChanged,
    /// A player made their final choice.
    FinalChoice,
}

/// Narrative or system text visible to every player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicLogEntry {
    /// Entry identifier.
    pub entry_id: Uuid,
    /// What the entry records.
    pub kind: LogKind,
    /// Display text.
    pub content: String,
    /// Act the entry was written in.
    pub act_number: u32,
    /// Phase the entry was written in.
    pub phase: Phase,
    /// Player involved, if any.
    pub related_player_id: Option<String>,
    /// Character involved, if any.
    pub related_character_id: Option<String>,
    /// When the entry was written.
    pub recorded_at: DateTime<Utc>,
}

/// Result of a phase change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseChange {
    /// Phase before the change.
    pub from: Phase,
    /// Phase after the change.
    pub to: Phase,
    /// Act after the change.
    pub current_act: u32,
    /// `true` if a new act began.
    pub act_advanced: bool,
}

/// The authoritative state of one game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    session_id: Uuid,
    script_id: String,
    title: String,
    created_by: String,
    current_act: u32,
    max_acts: u32,
    qna_limit_per_act: u32,
    current_phase: Phase,
    turn_order: Vec<String>,
    current_turn_index: usize,
    players: BTreeMap<String, PlayerState>,
    characters: BTreeMap<String, CharacterState>,
    public_log: Vec<PublicLogEntry>,
    qna_history: Vec<QnaEntry>,
    mission_submissions: Vec<MissionSubmission>,
    final_choices: Vec<FinalChoice>,
    /// Questions used, keyed by character id then act number.
    qna_counts: BTreeMap<String, BTreeMap<u32, u32>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Creates a session in `Initialization` with the script's characters.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if `max_acts` or
    /// `qna_limit_per_act` is zero, or the script fails validation.
    pub(crate) fn start(
        session_id: Uuid,
        script: &Script,
        created_by: &str,
        max_acts: u32,
        qna_limit_per_act: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        script.validate()?;
        if max_acts == 0 {
            return Err(DomainError::InvalidInput(
                "a session needs at least one act".to_owned(),
            ));
        }
        if qna_limit_per_act == 0 {
            return Err(DomainError::InvalidInput(
                "the per-act question limit must be at least 1".to_owned(),
            ));
        }

        let characters = script
            .characters
            .iter()
            .map(|profile| {
                (
                    profile.character_id.clone(),
                    CharacterState {
                        character_id: profile.character_id.clone(),
                        name: profile.name.clone(),
                        description: profile.description.clone(),
                        avatar: profile.avatar.clone(),
                        memory: Vec::new(),
                    },
                )
            })
            .collect();

        let mut state = Self {
            session_id,
            script_id: script.script_id.clone(),
            title: script.title.clone(),
            created_by: created_by.to_owned(),
            current_act: 1,
            max_acts,
            qna_limit_per_act,
            current_phase: Phase::Initialization,
            turn_order: Vec::new(),
            current_turn_index: 0,
            players: BTreeMap::new(),
            characters,
            public_log: Vec::new(),
            qna_history: Vec::new(),
            mission_submissions: Vec::new(),
            final_choices: Vec::new(),
            qna_counts: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        state.append_log(
            LogKind::SessionCreated,
            format!("New game created: {}", script.title),
            Some(created_by),
            None,
            now,
        );
        Ok(state)
    }

    // --- accessors ---

    /// Session identifier.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Script the session was started from.
    #[must_use]
    pub fn script_id(&self) -> &str {
        &self.script_id
    }

    /// Script title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Player who created the session.
    #[must_use]
    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    /// Current act (1-based).
    #[must_use]
    pub const fn current_act(&self) -> u32 {
        self.current_act
    }

    /// Last act of the session.
    #[must_use]
    pub const fn max_acts(&self) -> u32 {
        self.max_acts
    }

    /// Questions each character may receive per act.
    #[must_use]
    pub const fn qna_limit_per_act(&self) -> u32 {
        self.qna_limit_per_act
    }

    /// Current phase.
    #[must_use]
    pub const fn current_phase(&self) -> Phase {
        self.current_phase
    }

    /// Player ids in turn order.
    #[must_use]
    pub fn turn_order(&self) -> &[String] {
        &self.turn_order
    }

    /// Position of the current turn within [`turn_order`](Self::turn_order).
    #[must_use]
    pub const fn current_turn_index(&self) -> usize {
        self.current_turn_index
    }

    /// Player whose turn it is, if anyone has joined.
    #[must_use]
    pub fn current_turn_player(&self) -> Option<&str> {
        self.turn_order
            .get(self.current_turn_index)
            .map(String::as_str)
    }

    /// Joined players by id.
    #[must_use]
    pub const fn players(&self) -> &BTreeMap<String, PlayerState> {
        &self.players
    }

    /// Looks up a joined player.
    #[must_use]
    pub fn player(&self, player_id: &str) -> Option<&PlayerState> {
        self.players.get(player_id)
    }

    /// Characters by id.
    #[must_use]
    pub const fn characters(&self) -> &BTreeMap<String, CharacterState> {
        &self.characters
    }

    /// Looks up a character.
    #[must_use]
    pub fn character(&self, character_id: &str) -> Option<&CharacterState> {
        self.characters.get(character_id)
    }

    /// Public log, oldest first.
    #[must_use]
    pub fn public_log(&self) -> &[PublicLogEntry] {
        &self.public_log
    }

    /// Q&A history, oldest first.
    #[must_use]
    pub fn qna_history(&self) -> &[QnaEntry] {
        &self.qna_history
    }

    /// Mission submissions, oldest first.
    #[must_use]
    pub fn mission_submissions(&self) -> &[MissionSubmission] {
        &self.mission_submissions
    }

    /// Final choices, oldest first.
    #[must_use]
    pub fn final_choices(&self) -> &[FinalChoice] {
        &self.final_choices
    }

    /// Questions a character has received in `act_number`.
    #[must_use]
    pub fn quota_used(&self, character_id: &str, act_number: u32) -> u32 {
        self.qna_counts
            .get(character_id)
            .and_then(|acts| acts.get(&act_number))
            .copied()
            .unwrap_or(0)
    }

    /// Questions a character may still receive in the current act.
    #[must_use]
    pub fn quota_remaining(&self, character_id: &str) -> u32 {
        self.qna_limit_per_act
            .saturating_sub(self.quota_used(character_id, self.current_act))
    }

    /// When the session was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the session was last mutated.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// When the session reached `Completed`.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Facts the phase graph's guards evaluate.
    #[must_use]
    pub fn transition_context(&self) -> TransitionContext {
        TransitionContext {
            current_act: self.current_act,
            max_acts: self.max_acts,
            player_count: self.players.len(),
        }
    }

    // --- checks ---

    fn require(&self, trigger: Trigger) -> Result<(), DomainError> {
        phase::resolve(self.current_phase, trigger, None, &self.transition_context()).map(|_| ())
    }

    fn require_character(&self, character_id: &str) -> Result<&CharacterState, DomainError> {
        self.characters
            .get(character_id)
            .ok_or_else(|| DomainError::UnknownCharacter(character_id.to_owned()))
    }

    fn require_player(&self, player_id: &str) -> Result<&PlayerState, DomainError> {
        self.players
            .get(player_id)
            .ok_or_else(|| DomainError::UnknownPlayer(player_id.to_owned()))
    }

    /// Checks that `character_id` may give a monologue now.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` outside `Monologue` and
    /// `DomainError::UnknownCharacter` for characters not in the script.
    pub fn check_monologue(&self, character_id: &str) -> Result<&CharacterState, DomainError> {
        self.require(Trigger::Monologue)?;
        self.require_character(character_id)
    }

    /// Checks that `questioner_id` may question `character_id` now.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` outside `Qna`,
    /// `DomainError::UnknownCharacter`, `DomainError::UnknownPlayer` if the
    /// questioner has not joined, or `DomainError::QuotaExceeded` if the
    /// character has no questions left in the current act.
    pub fn check_question(
        &self,
        questioner_id: &str,
        character_id: &str,
    ) -> Result<&CharacterState, DomainError> {
        self.require(Trigger::Question)?;
        let character = self.require_character(character_id)?;
        self.require_player(questioner_id)?;
        if self.quota_remaining(character_id) == 0 {
            return Err(DomainError::QuotaExceeded {
                character_id: character_id.to_owned(),
                act_number: self.current_act,
                limit: self.qna_limit_per_act,
            });
        }
        Ok(character)
    }

    // --- low-level mutators ---

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn append_log(
        &mut self,
        kind: LogKind,
        content: String,
        related_player_id: Option<&str>,
        related_character_id: Option<&str>,
        now: DateTime<Utc>,
    ) {
        self.public_log.push(PublicLogEntry {
            entry_id: Uuid::new_v4(),
            kind,
            content,
            act_number: self.current_act,
            phase: self.current_phase,
            related_player_id: related_player_id.map(str::to_owned),
            related_character_id: related_character_id.map(str::to_owned),
            recorded_at: now,
        });
    }

    fn increment_quota(&mut self, character_id: &str) -> Result<u32, DomainError> {
        if self.quota_remaining(character_id) == 0 {
            return Err(DomainError::QuotaExceeded {
                character_id: character_id.to_owned(),
                act_number: self.current_act,
                limit: self.qna_limit_per_act,
            });
        }
        let count = self
            .qna_counts
            .entry(character_id.to_owned())
            .or_default()
            .entry(self.current_act)
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    fn advance_act(&mut self) -> Result<u32, DomainError> {
        if self.current_act >= self.max_acts {
            return Err(DomainError::InvalidTransition(format!(
                "act {} is the last act",
                self.current_act
            )));
        }
        self.current_act += 1;
        Ok(self.current_act)
    }

    fn advance_turn(&mut self) {
        if !self.turn_order.is_empty() {
            self.current_turn_index = (self.current_turn_index + 1) % self.turn_order.len();
        }
    }

    // --- engine operations ---

    /// Adds a player occupying `character_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` once the session is completed,
    /// `DomainError::InvalidInput` for a blank player id,
    /// `DomainError::AlreadyJoined`, `DomainError::UnknownCharacter`, or
    /// `DomainError::AlreadyAssigned` if another player holds the character.
    pub(crate) fn join_player(
        &mut self,
        player_id: &str,
        character_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PlayerState, DomainError> {
        if self.current_phase.is_terminal() {
            return Err(DomainError::InvalidTransition(format!(
                "session {} is {}",
                self.session_id, self.current_phase
            )));
        }
        if player_id.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "player id cannot be empty".to_owned(),
            ));
        }
        if self.players.contains_key(player_id) {
            return Err(DomainError::AlreadyJoined(player_id.to_owned()));
        }
        let name = self.require_character(character_id)?.name.clone();
        if let Some(holder) = self
            .players
            .values()
            .find(|player| player.character_id.as_deref() == Some(character_id))
        {
            return Err(DomainError::AlreadyAssigned {
                character_id: character_id.to_owned(),
                player_id: holder.player_id.clone(),
            });
        }

        let player = PlayerState {
            player_id: player_id.to_owned(),
            character_id: Some(character_id.to_owned()),
            joined_at: now,
            questions_asked: 0,
        };
        self.players.insert(player_id.to_owned(), player.clone());
        self.turn_order.push(player_id.to_owned());
        self.append_log(
            LogKind::PlayerJoined,
            format!("Player {player_id} joined as {name}"),
            Some(player_id),
            Some(character_id),
            now,
        );
        self.touch(now);
        Ok(player)
    }

    /// Records a character's monologue in the public log.
    ///
    /// # Errors
    ///
    /// See [`check_monologue`](Self::check_monologue).
    pub(crate) fn record_monologue(
        &mut self,
        character_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let name = self.check_monologue(character_id)?.name.clone();
        self.append_log(
            LogKind::Monologue,
            format!("{name}: {text}"),
            None,
            Some(character_id),
            now,
        );
        self.touch(now);
        Ok(())
    }

    /// Commits an answered question: appends the Q&A entry and a public log
    /// entry, counts it against the character's quota for the current act
    /// and passes the turn to the next player.
    ///
    /// # Errors
    ///
    /// See [`check_question`](Self::check_question).
    pub(crate) fn record_question(
        &mut self,
        questioner_id: &str,
        character_id: &str,
        question: &str,
        answer: &str,
        degraded: bool,
        now: DateTime<Utc>,
    ) -> Result<QnaEntry, DomainError> {
        let name = self.check_question(questioner_id, character_id)?.name.clone();
        self.increment_quota(character_id)?;

        let entry = QnaEntry {
            qna_id: Uuid::new_v4(),
            questioner_id: questioner_id.to_owned(),
            character_id: character_id.to_owned(),
            question: question.to_owned(),
            answer: answer.to_owned(),
            act_number: self.current_act,
            degraded,
            asked_at: now,
        };
        self.qna_history.push(entry.clone());
        if let Some(player) = self.players.get_mut(questioner_id) {
            player.questions_asked += 1;
        }
        self.append_log(
            LogKind::Question,
            format!("{questioner_id} asked {name}: {question}\n{name}: {answer}"),
            Some(questioner_id),
            Some(character_id),
            now,
        );
        self.advance_turn();
        self.touch(now);
        Ok(entry)
    }

    /// Appends a mission submission.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` outside `MissionSubmit`,
    /// `DomainError::UnknownPlayer`, or `DomainError::InvalidInput` for a
    /// blank category or content.
    pub(crate) fn submit_mission(
        &mut self,
        player_id: &str,
        category: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<MissionSubmission, DomainError> {
        self.require(Trigger::MissionSubmit)?;
        self.require_player(player_id)?;
        let category = category.trim();
        let content = content.trim();
        if category.is_empty() {
            return Err(DomainError::InvalidInput(
                "mission category cannot be empty".to_owned(),
            ));
        }
        if content.is_empty() {
            return Err(DomainError::InvalidInput(
                "mission content cannot be empty".to_owned(),
            ));
        }

        let submission = MissionSubmission {
            submission_id: Uuid::new_v4(),
            player_id: player_id.to_owned(),
            category: category.to_owned(),
            content: content.to_owned(),
            act_number: self.current_act,
            submitted_at: now,
        };
        self.mission_submissions.push(submission.clone());
        self.append_log(
            LogKind::MissionSubmitted,
            format!("Player {player_id} submitted a {category} mission"),
            Some(player_id),
            None,
            now,
        );
        self.touch(now);
        Ok(submission)
    }

    /// Records a player's final accusation. Each player chooses once.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` outside `FinalChoice`,
    /// `DomainError::UnknownPlayer`, `DomainError::UnknownCharacter` for the
    /// accused, or `DomainError::InvalidInput` if the player already chose.
    pub(crate) fn record_final_choice(
        &mut self,
        player_id: &str,
        accused_character_id: &str,
        now: DateTime<Utc>,
    ) -> Result<FinalChoice, DomainError> {
        self.require(Trigger::FinalChoice)?;
        self.require_player(player_id)?;
        let name = self.require_character(accused_character_id)?.name.clone();
        if self
            .final_choices
            .iter()
            .any(|choice| choice.player_id == player_id)
        {
            return Err(DomainError::InvalidInput(format!(
                "player {player_id} has already made a final choice"
            )));
        }

        let choice = FinalChoice {
            player_id: player_id.to_owned(),
            accused_character_id: accused_character_id.to_owned(),
            made_at: now,
        };
        self.final_choices.push(choice.clone());
        self.append_log(
            LogKind::FinalChoice,
            format!("Player {player_id} accused {name}"),
            Some(player_id),
            Some(accused_character_id),
            now,
        );
        self.touch(now);
        Ok(choice)
    }

    /// Moves the session along the phase graph.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the graph has no edge for
    /// the request or its guard rejects the current state.
    pub(crate) fn advance_phase(
        &mut self,
        target: Option<Phase>,
        now: DateTime<Utc>,
    ) -> Result<PhaseChange, DomainError> {
        let from = self.current_phase;
        let edge = phase::resolve(from, Trigger::Advance, target, &self.transition_context())?;

        let act_advanced = match edge.effect {
            Effect::NextAct => {
                self.advance_act()?;
                true
            }
            Effect::Stay => false,
        };
        self.current_phase = edge.to;
        if edge.to == Phase::Completed {
            self.completed_at = Some(now);
        }

        let content = if act_advanced {
            format!("Act {} begins with the {} phase", self.current_act, edge.to)
        } else {
            format!("Phase changed from {from} to {}", edge.to)
        };
        self.append_log(LogKind::PhaseChanged, content, None, None, now);
        self.touch(now);

        Ok(PhaseChange {
            from,
            to: edge.to,
            current_act: self.current_act,
            act_advanced,
        })
    }

    /// Adds `note` to a character's memory. Returns `false` if the character
    /// already knew of the exchange.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownCharacter` if the character is not part
    /// of the session.
    pub(crate) fn remember_exchange(
        &mut self,
        character_id: &str,
        note: &MemoryNote,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let character = self
            .characters
            .get_mut(character_id)
            .ok_or_else(|| DomainError::UnknownCharacter(character_id.to_owned()))?;
        if character.memory.iter().any(|known| known.qna_id == note.qna_id) {
            return Ok(false);
        }
        character.memory.push(note.clone());
        self.touch(now);
        Ok(true)
    }
}
