//! Request and response shapes at the generation boundary.

use serde::{Deserialize, Serialize};
use whodunit_core::error::DomainError;

/// Longest question, in characters, that is forwarded to the service.
pub const MAX_QUESTION_CHARS: usize = 1000;

/// Named capability of the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// A character introduces themselves.
    Monologue,
    /// A character answers a player's question.
    AnswerQuestion,
}

impl Capability {
    /// Returns the capability name used in logs and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monologue => "monologue",
            Self::AnswerQuestion => "answer_question",
        }
    }
}

/// A request to the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Which capability to invoke.
    pub capability: Capability,
    /// The character speaking.
    pub character_id: String,
    /// Current act of the session.
    pub act_number: u32,
    /// Conversational memory of the character, oldest first.
    pub context: Vec<String>,
    /// The player's question; required for [`Capability::AnswerQuestion`].
    pub question_text: Option<String>,
}

impl GenerationRequest {
    /// Builds a monologue request.
    #[must_use]
    pub fn monologue(character_id: impl Into<String>, act_number: u32, context: Vec<String>) -> Self {
        Self {
            capability: Capability::Monologue,
            character_id: character_id.into(),
            act_number,
            context,
            question_text: None,
        }
    }

    /// Builds a question-answering request.
    #[must_use]
    pub fn answer_question(
        character_id: impl Into<String>,
        act_number: u32,
        question_text: impl Into<String>,
        context: Vec<String>,
    ) -> Self {
        Self {
            capability: Capability::AnswerQuestion,
            character_id: character_id.into(),
            act_number,
            context,
            question_text: Some(question_text.into()),
        }
    }

    /// Checks the request before any network attempt.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the character id is blank, the
    /// act number is zero, or a question is missing, blank, or longer than
    /// [`MAX_QUESTION_CHARS`].
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.character_id.trim().is_empty() {
            return Err(DomainError::InvalidInput(
                "character id cannot be empty".to_owned(),
            ));
        }
        if self.act_number == 0 {
            return Err(DomainError::InvalidInput(
                "act number must be at least 1".to_owned(),
            ));
        }
        if self.capability == Capability::AnswerQuestion {
            let question = self.question_text.as_deref().map_or("", str::trim);
            if question.is_empty() {
                return Err(DomainError::InvalidInput(
                    "question text cannot be empty".to_owned(),
                ));
            }
            let length = question.chars().count();
            if length > MAX_QUESTION_CHARS {
                return Err(DomainError::InvalidInput(format!(
                    "question is too long ({length} characters, max {MAX_QUESTION_CHARS})"
                )));
            }
        }
        Ok(())
    }
}

/// Text produced for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    /// The generated (or fallback) text.
    pub text: String,
    /// `true` when `text` is fallback content after the service failed.
    pub degraded: bool,
}

impl Generation {
    /// Deterministic stand-in used when the service cannot be reached.
    #[must_use]
    pub fn fallback(request: &GenerationRequest) -> Self {
        let character = request.character_id.trim();
        let text = match request.capability {
            Capability::Monologue => {
                format!("{character} gathers their thoughts but says nothing more for now.")
            }
            Capability::AnswerQuestion => {
                format!("{character} cannot answer that right now. Try asking again later.")
            }
        };
        Self {
            text,
            degraded: true,
        }
    }
}
