//! `PostgreSQL` implementation of the `SnapshotRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use whodunit_core::error::DomainError;
use whodunit_core::repository::{SnapshotRepository, StoredSnapshot};

type SnapshotRow = (Uuid, i32, serde_json::Value, DateTime<Utc>);

/// PostgreSQL-backed snapshot repository. One row per session.
#[derive(Debug, Clone)]
pub struct PgSnapshotRepository {
    pool: PgPool,
}

impl PgSnapshotRepository {
    /// Creates a new `PgSnapshotRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotRepository for PgSnapshotRepository {
    async fn load_snapshot(&self, session_id: Uuid) -> Result<Option<StoredSnapshot>, DomainError> {
        let row: Option<SnapshotRow> = sqlx::query_as(
            "SELECT session_id, schema_version, payload, saved_at \
             FROM session_snapshots WHERE session_id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::Persistence(format!("failed to load snapshot: {e}")))?;

        Ok(row.map(
            |(session_id, schema_version, payload, saved_at)| StoredSnapshot {
                session_id,
                schema_version,
                payload,
                saved_at,
            },
        ))
    }

    async fn save_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO session_snapshots (session_id, schema_version, payload, saved_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (session_id) DO UPDATE SET \
                 schema_version = EXCLUDED.schema_version, \
                 payload = EXCLUDED.payload, \
                 saved_at = EXCLUDED.saved_at",
        )
        .bind(snapshot.session_id)
        .bind(snapshot.schema_version)
        .bind(&snapshot.payload)
        .bind(snapshot.saved_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::Persistence(format!("failed to save snapshot: {e}")))?;

        debug!(session_id = %snapshot.session_id, "snapshot row upserted");
        Ok(())
    }
}
