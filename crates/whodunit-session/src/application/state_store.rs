//! Loading and saving session state through a [`SnapshotRepository`].
//!
//! A session is persisted as one JSON snapshot that is replaced on every
//! committed action. The encoding is versioned so older snapshots can be
//! rejected instead of misread.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;
use whodunit_core::clock::Clock;
use whodunit_core::error::DomainError;
use whodunit_core::repository::{SnapshotRepository, StoredSnapshot};

use crate::domain::state::SessionState;

/// Version of the snapshot payload written by this crate.
pub const SCHEMA_VERSION: i32 = 1;

/// Serializes `state` into a snapshot.
///
/// # Errors
///
/// Returns `DomainError::Persistence` if the state cannot be serialized.
pub fn encode(state: &SessionState, clock: &dyn Clock) -> Result<StoredSnapshot, DomainError> {
    let payload = serde_json::to_value(state)
        .map_err(|e| DomainError::Persistence(format!("snapshot serialization failed: {e}")))?;
    Ok(StoredSnapshot {
        session_id: state.session_id(),
        schema_version: SCHEMA_VERSION,
        payload,
        saved_at: clock.now(),
    })
}

/// Restores session state from a snapshot.
///
/// # Errors
///
/// Returns `DomainError::Persistence` if the schema version is unknown or the
/// payload does not decode.
pub fn decode(snapshot: &StoredSnapshot) -> Result<SessionState, DomainError> {
    if snapshot.schema_version != SCHEMA_VERSION {
        return Err(DomainError::Persistence(format!(
            "unsupported snapshot schema version {} for session {}",
            snapshot.schema_version, snapshot.session_id
        )));
    }
    serde_json::from_value(snapshot.payload.clone())
        .map_err(|e| DomainError::Persistence(format!("snapshot deserialization failed: {e}")))
}

/// Session state persistence on top of a snapshot repository.
#[derive(Clone)]
pub struct SessionStateStore {
    repository: Arc<dyn SnapshotRepository>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SessionStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStateStore").finish_non_exhaustive()
    }
}

impl SessionStateStore {
    /// Creates a store.
    #[must_use]
    pub fn new(repository: Arc<dyn SnapshotRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Loads the latest state of a session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SessionNotFound` if the session was never saved,
    /// or `DomainError::Persistence` if loading or decoding fails.
    pub async fn load(&self, session_id: Uuid) -> Result<SessionState, DomainError> {
        let snapshot = self
            .repository
            .load_snapshot(session_id)
            .await?
            .ok_or(DomainError::SessionNotFound(session_id))?;
        decode(&snapshot)
    }

    /// Replaces the stored state of a session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Persistence` if encoding or writing fails.
    pub async fn save(&self, state: &SessionState) -> Result<(), DomainError> {
        let snapshot = encode(state, self.clock.as_ref())?;
        self.repository.save_snapshot(&snapshot).await?;
        debug!(session_id = %state.session_id(), "session snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use whodunit_test_support::{FailingSnapshotRepository, FixedClock, RecordingSnapshotRepository};

    use super::*;
    use crate::domain::phase::Phase;
    use crate::domain::state::MemoryNote;
    use crate::domain::state::tests::manor_script;

    fn fixed_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()))
    }

    fn sample_state() -> SessionState {
        let clock = fixed_clock();
        let mut state =
            SessionState::start(Uuid::new_v4(), &manor_script(), "host", 3, 3, clock.now()).unwrap();
        state.join_player("alice", "butler", clock.now()).unwrap();
        state
    }

    #[tokio::test]
    async fn test_save_then_load_restores_identical_state() {
        // Arrange
        let repo = Arc::new(RecordingSnapshotRepository::new());
        let store = SessionStateStore::new(repo.clone(), fixed_clock());
        let state = sample_state();

        // Act
        store.save(&state).await.unwrap();
        let loaded = store.load(state.session_id()).await.unwrap();

        // Assert
        assert_eq!(loaded, state);
        let saved = repo.saved_snapshots();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].schema_version, SCHEMA_VERSION);
        assert_eq!(saved[0].payload["current_phase"], "initialization");
    }

    /// A two-act game played to the final choice, with sub-second timestamps.
    fn played_state() -> SessionState {
        let at = |n: i64| Utc.timestamp_opt(1_768_471_200 + n, 123_456_789).unwrap();
        let mut state =
            SessionState::start(Uuid::new_v4(), &manor_script(), "host", 2, 3, at(0)).unwrap();
        state.join_player("alice", "butler", at(1)).unwrap();
        state.join_player("bob", "maid", at(2)).unwrap();
        state.advance_phase(None, at(3)).unwrap();
        state.record_monologue("butler", "I polished the silver all night.", at(4)).unwrap();
        state.advance_phase(None, at(5)).unwrap();
        let entry = state
            .record_question("alice", "cook", "Where were you?", "In the pantry.", false, at(6))
            .unwrap();
        let note = MemoryNote::from_entry(&entry, at(7));
        state.remember_exchange("maid", &note, at(7)).unwrap();
        state.remember_exchange("butler", &note, at(7)).unwrap();
        state.advance_phase(None, at(8)).unwrap();
        state.submit_mission("bob", "clue", "The pantry door was unlocked.", at(9)).unwrap();
        state.advance_phase(None, at(10)).unwrap();
        state.advance_phase(None, at(11)).unwrap();
        state
            .record_question("bob", "cook", "Who had the key?", "Nobody.", true, at(12))
            .unwrap();
        state.advance_phase(None, at(13)).unwrap();
        state.advance_phase(None, at(14)).unwrap();
        state.record_final_choice("alice", "cook", at(15)).unwrap();
        state
    }

    #[tokio::test]
    async fn test_played_session_survives_save_and_load() {
        // Arrange
        let store = SessionStateStore::new(Arc::new(RecordingSnapshotRepository::new()), fixed_clock());
        let state = played_state();
        assert_eq!(state.current_phase(), Phase::FinalChoice);
        assert_eq!(state.current_act(), 2);

        // Act
        store.save(&state).await.unwrap();
        let loaded = store.load(state.session_id()).await.unwrap();

        // Assert
        assert_eq!(loaded, state);
        assert_eq!(loaded.quota_used("cook", 1), 1);
        assert_eq!(loaded.quota_used("cook", 2), 1);
        assert_eq!(loaded.qna_history().len(), 2);
        assert!(loaded.qna_history()[1].degraded);
        assert_eq!(loaded.character("maid").unwrap().memory.len(), 1);
        assert_eq!(loaded.mission_submissions().len(), 1);
        assert_eq!(loaded.final_choices()[0].accused_character_id, "cook");
        assert_eq!(loaded.updated_at().timestamp_subsec_nanos(), 123_456_789);
    }

    #[tokio::test]
    async fn test_load_unknown_session_returns_not_found() {
        let store = SessionStateStore::new(Arc::new(RecordingSnapshotRepository::new()), fixed_clock());
        let session_id = Uuid::new_v4();

        let result = store.load(session_id).await;

        assert_eq!(result.unwrap_err(), DomainError::SessionNotFound(session_id));
    }

    #[tokio::test]
    async fn test_repository_failure_surfaces_as_persistence_error() {
        let store = SessionStateStore::new(Arc::new(FailingSnapshotRepository), fixed_clock());

        let result = store.save(&sample_state()).await;

        assert!(matches!(result, Err(DomainError::Persistence(_))));
    }

    #[test]
    fn test_decode_rejects_unknown_schema_version() {
        let clock = fixed_clock();
        let mut snapshot = encode(&sample_state(), clock.as_ref()).unwrap();
        snapshot.schema_version = 99;

        match decode(&snapshot).unwrap_err() {
            DomainError::Persistence(message) => assert!(message.contains("version 99")),
            other => panic!("expected Persistence, got {other:?}"),
        }
    }
}
