//! Per-session mutual exclusion.
//!
//! Every action on a session runs while holding that session's lock, so
//! actions on one session apply in arrival order and never interleave.
//! Different sessions never contend. Waiters queue on a fair mutex; a waiter
//! that is still queued after the configured wait gives up with
//! `DomainError::SessionBusy`.
//!
//! An entry lives only while someone holds or waits for it. The last
//! [`SessionGuard`] or waiter to leave removes it, so ids that never name a
//! session leave nothing behind.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;
use uuid::Uuid;
use whodunit_core::error::DomainError;

type LockTable = DashMap<Uuid, Arc<Mutex<()>>>;

/// Removes the session's entry on drop unless another task still uses it.
#[derive(Debug)]
struct EntryHandle {
    locks: Arc<LockTable>,
    session_id: Uuid,
}

impl Drop for EntryHandle {
    fn drop(&mut self) {
        self.locks
            .remove_if(&self.session_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Exclusive access to one session. Dropping it releases the session.
#[derive(Debug)]
pub struct SessionGuard {
    // Field order matters: the mutex guard must release its reference to the
    // lock before the entry handle checks whether the entry is still in use.
    _guard: OwnedMutexGuard<()>,
    _entry: EntryHandle,
}

/// Registry of per-session locks.
#[derive(Debug)]
pub struct SessionLocks {
    locks: Arc<LockTable>,
    wait: Duration,
}

impl SessionLocks {
    /// Creates a registry whose acquisitions wait at most `wait`.
    #[must_use]
    pub fn new(wait: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            wait,
        }
    }

    fn lock_for(&self, session_id: Uuid) -> Arc<Mutex<()>> {
        Arc::clone(
            self.locks
                .entry(session_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Acquires the lock for `session_id`, waiting at most the configured
    /// duration.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SessionBusy` if the lock is not acquired in time.
    pub async fn acquire(&self, session_id: Uuid) -> Result<SessionGuard, DomainError> {
        let entry = EntryHandle {
            locks: Arc::clone(&self.locks),
            session_id,
        };
        let acquired = tokio::time::timeout(self.wait, self.lock_for(session_id).lock_owned()).await;
        match acquired {
            Ok(guard) => Ok(SessionGuard {
                _guard: guard,
                _entry: entry,
            }),
            Err(_) => {
                warn!(
                    %session_id,
                    wait_ms = u64::try_from(self.wait.as_millis()).unwrap_or(u64::MAX),
                    "session lock wait expired"
                );
                Err(DomainError::SessionBusy(session_id))
            }
        }
    }

    /// Number of sessions currently held or waited on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns `true` if no session is held or waited on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
