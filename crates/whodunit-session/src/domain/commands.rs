//! Commands for the session context.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use whodunit_core::command::Command;

use super::phase::{Phase, Trigger};

/// Command to start a new session from a script.
#[derive(Debug, Clone)]
pub struct StartSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The script to play.
    pub script_id: String,
    /// The player creating the session.
    pub creator_id: String,
}

impl Command for StartSession {
    fn command_type(&self) -> &'static str {
        "session.start"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn session_id(&self) -> Option<Uuid> {
        None
    }
}

/// Command to join a session as a character.
#[derive(Debug, Clone)]
pub struct JoinSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session to join.
    pub session_id: Uuid,
    /// The joining player.
    pub player_id: String,
    /// The character to occupy.
    pub character_id: String,
}

impl Command for JoinSession {
    fn command_type(&self) -> &'static str {
        "session.join"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn session_id(&self) -> Option<Uuid> {
        Some(self.session_id)
    }
}

/// A player action within a running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum Action {
    /// A character introduces themselves.
    Monologue {
        /// The speaking character.
        character_id: String,
    },
    /// A player questions a character.
    #[serde(rename = "qna")]
    Question {
        /// The asking player.
        questioner_id: String,
        /// The questioned character.
        character_id: String,
        /// The question.
        question_text: String,
    },
    /// A player submits a mission or clue.
    MissionSubmit {
        /// The submitting player.
        player_id: String,
        /// Category tag.
        category: String,
        /// Free-text content.
        content: String,
    },
    /// A request to move the session along the phase graph.
    AdvancePhase {
        /// Phase to enter; the first legal edge is taken when absent.
        #[serde(default)]
        target_phase: Option<Phase>,
    },
    /// A player's final accusation.
    FinalChoice {
        /// The accusing player.
        player_id: String,
        /// The accused character.
        accused_character_id: String,
    },
}

impl Action {
    /// The phase graph trigger this action requests.
    #[must_use]
    pub const fn trigger(&self) -> Trigger {
        match self {
            Self::Monologue { .. } => Trigger::Monologue,
            Self::Question { .. } => Trigger::Question,
            Self::MissionSubmit { .. } => Trigger::MissionSubmit,
            Self::AdvancePhase { .. } => Trigger::Advance,
            Self::FinalChoice { .. } => Trigger::FinalChoice,
        }
    }

    /// Wire name of the action.
    #[must_use]
    pub const fn action_type(&self) -> &'static str {
        self.trigger().as_str()
    }
}

/// Command to apply a player action to a session.
#[derive(Debug, Clone)]
pub struct SubmitAction {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The target session.
    pub session_id: Uuid,
    /// The action to apply.
    pub action: Action,
}

impl Command for SubmitAction {
    fn command_type(&self) -> &'static str {
        match self.action {
            Action::Monologue { .. } => "session.monologue",
            Action::Question { .. } => "session.qna",
            Action::MissionSubmit { .. } => "session.mission_submit",
            Action::AdvancePhase { .. } => "session.advance_phase",
            Action::FinalChoice { .. } => "session.final_choice",
        }
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn session_id(&self) -> Option<Uuid> {
        Some(self.session_id)
    }
}
