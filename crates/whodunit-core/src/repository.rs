//! Snapshot repository abstraction.
//!
//! The engine persists one opaque snapshot per session. Repositories store
//! and return the blob verbatim; encoding and decoding session state is the
//! session crate's concern.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// Stored representation of a session snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    /// Session this snapshot belongs to.
    pub session_id: Uuid,
    /// Version of the payload encoding.
    pub schema_version: i32,
    /// Serialized session state.
    pub payload: serde_json::Value,
    /// When the snapshot was written.
    pub saved_at: DateTime<Utc>,
}

/// Repository trait for loading and replacing session snapshots.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Load the latest snapshot for a session, or `None` if the session was
    /// never saved.
    async fn load_snapshot(&self, session_id: Uuid) -> Result<Option<StoredSnapshot>, DomainError>;

    /// Replace the snapshot for `snapshot.session_id` with `snapshot`.
    async fn save_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError>;
}
