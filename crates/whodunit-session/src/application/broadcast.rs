//! Fan-out of answered questions into the other characters' memory.
//!
//! Jobs are scheduled by the engine after a Q&A exchange is saved and run
//! in the background. A job inherits the [`SessionGuard`] of the action that
//! produced it, so the caller gets its answer first while the next action on
//! the session waits until the exchange is in every recipient's memory. The
//! job loads the latest state, adds a [`MemoryNote`] to every recipient and
//! saves once. A recipient that cannot be updated is logged and skipped; the
//! others still receive the note. Jobs are not retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use whodunit_core::clock::Clock;
use whodunit_core::error::DomainError;

use crate::application::locks::SessionGuard;
use crate::application::state_store::SessionStateStore;
use crate::domain::state::{MemoryNote, QnaEntry};

/// One exchange to deliver to a set of characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastJob {
    /// Session of the exchange.
    pub session_id: Uuid,
    /// The committed exchange.
    pub entry: QnaEntry,
    /// Characters to inform. The answering character is always skipped.
    pub recipients: Vec<String>,
}

#[derive(Debug, Default)]
struct Progress {
    pending: AtomicUsize,
    idle: Notify,
}

impl Progress {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// A job together with the lock it releases when done.
struct QueuedJob {
    job: BroadcastJob,
    guard: SessionGuard,
}

/// Marks a job finished when dropped, including when its task panics.
struct PendingGuard(Arc<Progress>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.finish_one();
    }
}

/// Everything a job needs to run.
#[derive(Clone)]
struct Worker {
    store: SessionStateStore,
    clock: Arc<dyn Clock>,
}

/// Accepts broadcast jobs and runs each in its own task.
#[derive(Debug, Clone)]
pub struct BroadcastCoordinator {
    sender: mpsc::UnboundedSender<QueuedJob>,
    progress: Arc<Progress>,
}

impl BroadcastCoordinator {
    /// Starts the dispatcher task. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn spawn(store: SessionStateStore, clock: Arc<dyn Clock>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<QueuedJob>();
        let progress = Arc::new(Progress::default());
        let worker = Worker { store, clock };

        let dispatch_progress = Arc::clone(&progress);
        tokio::spawn(async move {
            while let Some(QueuedJob { job, guard }) = receiver.recv().await {
                let worker = worker.clone();
                let pending = PendingGuard(Arc::clone(&dispatch_progress));
                tokio::spawn(async move {
                    let _pending = pending;
                    let result = worker.fan_out(&job).await;
                    drop(guard);
                    if let Err(err) = result {
                        error!(
                            session_id = %job.session_id,
                            qna_id = %job.entry.qna_id,
                            error = %err,
                            "broadcast job failed"
                        );
                    }
                });
            }
            debug!("broadcast dispatcher stopped");
        });

        Self { sender, progress }
    }

    /// Queues a job. Returns immediately. `guard` is released once the job
    /// has finished.
    pub fn schedule(&self, job: BroadcastJob, guard: SessionGuard) {
        self.progress.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(rejected) = self.sender.send(QueuedJob { job, guard }) {
            self.progress.finish_one();
            warn!(
                session_id = %rejected.0.job.session_id,
                "broadcast dispatcher is gone, dropping job"
            );
        }
    }

    /// Number of jobs scheduled but not yet finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.progress.pending.load(Ordering::SeqCst)
    }

    /// Resolves once every scheduled job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.progress.idle.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Worker {
    #[instrument(skip_all, fields(session_id = %job.session_id, qna_id = %job.entry.qna_id))]
    async fn fan_out(&self, job: &BroadcastJob) -> Result<usize, DomainError> {
        let mut state = self.store.load(job.session_id).await?;
        let now = self.clock.now();
        let note = MemoryNote::from_entry(&job.entry, now);

        let mut delivered = 0;
        for recipient in &job.recipients {
            if *recipient == job.entry.character_id {
                continue;
            }
            match state.remember_exchange(recipient, &note, now) {
                Ok(true) => delivered += 1,
                Ok(false) => debug!(character_id = %recipient, "exchange already known"),
                Err(error) => {
                    warn!(character_id = %recipient, %error, "skipping memory update");
                }
            }
        }

        if delivered > 0 {
            self.store.save(&state).await?;
        }
        info!(delivered, "exchange broadcast to characters");
        Ok(delivered)
    }
}
