//! Command abstractions.

use uuid::Uuid;

/// Trait implemented by every request that mutates a game session.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Stable command name, used as a tracing field and in logs.
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// The session this command targets, or `None` for commands that create
    /// a new session.
    fn session_id(&self) -> Option<Uuid>;
}
