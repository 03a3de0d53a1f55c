//! Test generation service: scripted `GenerationService` for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use whodunit_generation::{GenerationError, GenerationRequest, GenerationService};

#[derive(Debug, Clone)]
enum Mode {
    Echo,
    Fail(GenerationError),
}

/// A generation service that answers deterministically and records every
/// request it receives.
///
/// In echo mode a monologue yields `"<character> introduces themselves"`
/// and a question yields `"<character> answers: <question>"`.
#[derive(Debug)]
pub struct ScriptedGenerationService {
    mode: Mode,
    delay: Duration,
    calls: AtomicU32,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerationService {
    /// A service that always succeeds with echo text.
    #[must_use]
    pub fn echo() -> Self {
        Self::with_mode(Mode::Echo)
    }

    /// A service that always fails with `error`.
    #[must_use]
    pub fn failing(error: GenerationError) -> Self {
        Self::with_mode(Mode::Fail(error))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Sleeps for `delay` before answering each call.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of calls received.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerationService {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.mode {
            Mode::Fail(error) => Err(error.clone()),
            Mode::Echo => Ok(match &request.question_text {
                Some(question) => format!("{} answers: {question}", request.character_id),
                None => format!("{} introduces themselves", request.character_id),
            }),
        }
    }
}
