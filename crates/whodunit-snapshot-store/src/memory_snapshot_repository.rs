//! In-process implementation of the `SnapshotRepository` trait.
//!
//! Used when no database is configured. Snapshots live as long as the
//! process.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use whodunit_core::error::DomainError;
use whodunit_core::repository::{SnapshotRepository, StoredSnapshot};

/// Snapshot repository backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    snapshots: DashMap<Uuid, StoredSnapshot>,
}

impl InMemorySnapshotRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns `true` if no session is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn load_snapshot(&self, session_id: Uuid) -> Result<Option<StoredSnapshot>, DomainError> {
        Ok(self
            .snapshots
            .get(&session_id)
            .map(|entry| entry.value().clone()))
    }

    async fn save_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        self.snapshots.insert(snapshot.session_id, snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn snapshot(session_id: Uuid, act: u32) -> StoredSnapshot {
        StoredSnapshot {
            session_id,
            schema_version: 1,
            payload: serde_json::json!({ "current_act": act }),
            saved_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_load_returns_none_for_unknown_session() {
        let repo = InMemorySnapshotRepository::new();

        let loaded = repo.load_snapshot(Uuid::new_v4()).await.unwrap();

        assert!(loaded.is_none());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        // Arrange
        let repo = InMemorySnapshotRepository::new();
        let session_id = Uuid::new_v4();
        repo.save_snapshot(&snapshot(session_id, 1)).await.unwrap();

        // Act
        repo.save_snapshot(&snapshot(session_id, 2)).await.unwrap();

        // Assert
        let loaded = repo.load_snapshot(session_id).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot(session_id, 2));
        assert_eq!(repo.len(), 1);
    }
}
