//! Shared test mocks and utilities for the Whodunit session engine.

mod clock;
mod generation;
mod repository;
mod rng;

pub use clock::FixedClock;
pub use generation::ScriptedGenerationService;
pub use repository::{FailingSnapshotRepository, RecordingSnapshotRepository};
pub use rng::MockRng;
