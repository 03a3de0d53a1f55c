//! Retry, timeout and fallback policy around a [`GenerationService`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, instrument, warn};
use whodunit_core::error::DomainError;
use whodunit_core::rng::DeterministicRng;

use crate::error::GenerationError;
use crate::policy::RetryPolicy;
use crate::request::{Generation, GenerationRequest};
use crate::service::GenerationService;

/// Uniform entry point for the generation capabilities.
pub struct GenerationAdapter {
    service: Arc<dyn GenerationService>,
    policy: RetryPolicy,
    rng: Mutex<Box<dyn DeterministicRng>>,
}

impl std::fmt::Debug for GenerationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationAdapter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl GenerationAdapter {
    /// Creates an adapter. `rng` supplies the backoff jitter.
    #[must_use]
    pub fn new(
        service: Arc<dyn GenerationService>,
        policy: RetryPolicy,
        rng: Box<dyn DeterministicRng>,
    ) -> Self {
        Self {
            service,
            policy,
            rng: Mutex::new(rng),
        }
    }

    /// Generates a self-introduction for a character.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the request fails validation.
    pub async fn monologue(
        &self,
        character_id: &str,
        act_number: u32,
        context: Vec<String>,
    ) -> Result<Generation, DomainError> {
        self.generate(GenerationRequest::monologue(character_id, act_number, context))
            .await
    }

    /// Generates a character's answer to a question.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the request fails validation.
    pub async fn answer_question(
        &self,
        character_id: &str,
        act_number: u32,
        question_text: &str,
        context: Vec<String>,
    ) -> Result<Generation, DomainError> {
        self.generate(GenerationRequest::answer_question(
            character_id,
            act_number,
            question_text.trim(),
            context,
        ))
        .await
    }

    /// Validates `request`, then calls the service until it succeeds, a
    /// non-transient error occurs, or the attempt ceiling is reached. Service
    /// failures never surface as errors; they yield a degraded fallback.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidInput` if the request fails validation.
    /// No network attempt is made in that case.
    #[instrument(
        skip(self, request),
        fields(capability = request.capability.as_str(), character_id = %request.character_id)
    )]
    pub async fn generate(&self, request: GenerationRequest) -> Result<Generation, DomainError> {
        request.validate()?;

        let attempts = self.policy.attempts();
        let mut attempt = 1;
        loop {
            match self.attempt(&request).await {
                Ok(text) => {
                    debug!(attempt, "generation succeeded");
                    return Ok(Generation {
                        text,
                        degraded: false,
                    });
                }
                Err(error) if error.is_transient() && attempt < attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        %error,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "generation attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    warn!(
                        %error,
                        attempt,
                        "generation unavailable, returning degraded fallback"
                    );
                    return Ok(Generation::fallback(&request));
                }
            }
        }
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let call = self.service.generate(request);
        let text = tokio::time::timeout(self.policy.timeout, call)
            .await
            .map_err(|_| GenerationError::Timeout(self.policy.timeout))??;
        if text.trim().is_empty() {
            return Err(GenerationError::Malformed("empty text".to_owned()));
        }
        Ok(text)
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        let jitter_ceiling = self.policy.jitter_millis();
        let jitter = if jitter_ceiling == 0 {
            0
        } else {
            self.rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .next_u32_range(0, jitter_ceiling)
        };
        self.policy.backoff_after(attempt) + Duration::from_millis(u64::from(jitter))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use whodunit_core::rng::StdDeterministicRng;

    use super::*;

    /// Fails the first `failures` calls with `error`, then echoes the request.
    struct FlakyService {
        failures: u32,
        error: GenerationError,
        calls: AtomicU32,
    }

    #[async_trait]
    impl GenerationService for FlakyService {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(self.error.clone());
            }
            Ok(format!("{} speaks", request.character_id))
        }
    }

    /// Never answers within any sane timeout.
    struct SlowService {
        calls: AtomicU32,
    }

    #[async_trait]
    impl GenerationService for SlowService {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_owned())
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(20),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            jitter: Duration::from_millis(1),
        }
    }

    fn adapter_with(service: Arc<dyn GenerationService>) -> GenerationAdapter {
        GenerationAdapter::new(
            service,
            fast_policy(),
            Box::new(StdDeterministicRng::seeded(1)),
        )
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_until_success() {
        // Arrange
        let service = Arc::new(FlakyService {
            failures: 2,
            error: GenerationError::Transport("reset".into()),
            calls: AtomicU32::new(0),
        });
        let adapter = adapter_with(service.clone());

        // Act
        let generation = adapter.monologue("maid", 1, Vec::new()).await.unwrap();

        // Assert
        assert_eq!(generation.text, "maid speaks");
        assert!(!generation.degraded);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_return_degraded_fallback() {
        // Arrange
        let service = Arc::new(FlakyService {
            failures: u32::MAX,
            error: GenerationError::Upstream {
                status: 502,
                message: "bad gateway".into(),
            },
            calls: AtomicU32::new(0),
        });
        let adapter = adapter_with(service.clone());

        // Act
        let generation = adapter
            .answer_question("butler", 1, "Where were you?", Vec::new())
            .await
            .unwrap();

        // Assert
        assert!(generation.degraded);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
        let expected = Generation::fallback(&GenerationRequest::answer_question(
            "butler",
            1,
            "Where were you?",
            Vec::new(),
        ));
        assert_eq!(generation, expected);
    }

    #[tokio::test]
    async fn test_non_transient_failure_skips_remaining_attempts() {
        // Arrange
        let service = Arc::new(FlakyService {
            failures: u32::MAX,
            error: GenerationError::Upstream {
                status: 401,
                message: "bad key".into(),
            },
            calls: AtomicU32::new(0),
        });
        let adapter = adapter_with(service.clone());

        // Act
        let generation = adapter.monologue("maid", 1, Vec::new()).await.unwrap();

        // Assert
        assert!(generation.degraded);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeouts_count_as_transient_failures() {
        // Arrange
        let service = Arc::new(SlowService {
            calls: AtomicU32::new(0),
        });
        let adapter = adapter_with(service.clone());

        // Act
        let generation = adapter.monologue("maid", 2, Vec::new()).await.unwrap();

        // Assert
        assert!(generation.degraded);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_text_is_treated_as_malformed() {
        // Arrange
        struct BlankService;

        #[async_trait]
        impl GenerationService for BlankService {
            async fn generate(
                &self,
                _request: &GenerationRequest,
            ) -> Result<String, GenerationError> {
                Ok("  ".to_owned())
            }
        }
        let adapter = adapter_with(Arc::new(BlankService));

        // Act
        let generation = adapter.monologue("maid", 1, Vec::new()).await.unwrap();

        // Assert
        assert!(generation.degraded);
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_any_call() {
        // Arrange
        let service = Arc::new(FlakyService {
            failures: 0,
            error: GenerationError::Transport("unused".into()),
            calls: AtomicU32::new(0),
        });
        let adapter = adapter_with(service.clone());

        // Act
        let result = adapter.answer_question("butler", 1, "", Vec::new()).await;

        // Assert
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }
}
