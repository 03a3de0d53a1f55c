//! Whodunit: character generation adapter.
//!
//! Wraps the external content-generation service behind a stable contract:
//! requests are validated locally, every attempt is bounded by a timeout,
//! transient failures are retried with capped exponential backoff, and when
//! the service stays unavailable a deterministic fallback text is returned
//! flagged as degraded so gameplay never stalls.

pub mod adapter;
pub mod error;
pub mod http;
pub mod policy;
pub mod request;
pub mod service;

pub use adapter::GenerationAdapter;
pub use error::GenerationError;
pub use policy::RetryPolicy;
pub use request::{Capability, Generation, GenerationRequest};
pub use service::{GenerationService, UnconfiguredGenerationService};
