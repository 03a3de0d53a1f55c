//! Test repositories: mock `SnapshotRepository` implementations for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use uuid::Uuid;
use whodunit_core::error::DomainError;
use whodunit_core::repository::{SnapshotRepository, StoredSnapshot};

/// A snapshot repository that keeps the latest snapshot per session in
/// memory and records every save. Saves can be switched to fail at runtime
/// to exercise persistence-error paths mid-scenario.
#[derive(Debug, Default)]
pub struct RecordingSnapshotRepository {
    snapshots: Mutex<HashMap<Uuid, StoredSnapshot>>,
    saved: Mutex<Vec<StoredSnapshot>>,
    fail_saves: AtomicBool,
}

impl RecordingSnapshotRepository {
    /// Create an empty repository whose saves succeed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following save fail (`true`) or succeed (`false`).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Returns every snapshot that was saved successfully, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved_snapshots(&self) -> Vec<StoredSnapshot> {
        self.saved.lock().unwrap().clone()
    }

    /// Number of successful saves for `session_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn save_count(&self, session_id: Uuid) -> usize {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .filter(|snapshot| snapshot.session_id == session_id)
            .count()
    }
}

#[async_trait]
impl SnapshotRepository for RecordingSnapshotRepository {
    async fn load_snapshot(&self, session_id: Uuid) -> Result<Option<StoredSnapshot>, DomainError> {
        Ok(self.snapshots.lock().unwrap().get(&session_id).cloned())
    }

    async fn save_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(DomainError::Persistence("disk full".into()));
        }
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.session_id, snapshot.clone());
        self.saved.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}

/// A snapshot repository that always returns a persistence error.
#[derive(Debug)]
pub struct FailingSnapshotRepository;

#[async_trait]
impl SnapshotRepository for FailingSnapshotRepository {
    async fn load_snapshot(&self, _session_id: Uuid) -> Result<Option<StoredSnapshot>, DomainError> {
        Err(DomainError::Persistence("connection refused".into()))
    }

    async fn save_snapshot(&self, _snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        Err(DomainError::Persistence("connection refused".into()))
    }
}
