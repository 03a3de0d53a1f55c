//! The raw external call.

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::request::GenerationRequest;

/// One attempt against the external generation service.
///
/// Implementations perform a single call with no retries or timeouts of
/// their own; [`GenerationAdapter`](crate::GenerationAdapter) owns that
/// policy.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produces text for `request`.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Service used when no generation endpoint is configured. Every call fails
/// without retry, so each action gets fallback text.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredGenerationService;

#[async_trait]
impl GenerationService for UnconfiguredGenerationService {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::Unconfigured)
    }
}
