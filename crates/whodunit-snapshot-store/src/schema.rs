//! Snapshot store database schema.

use sqlx::PgPool;

/// SQL to create the snapshots table.
pub const CREATE_SNAPSHOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS session_snapshots (
    session_id     UUID PRIMARY KEY,
    schema_version INTEGER NOT NULL,
    payload        JSONB NOT NULL,
    saved_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

/// Creates the snapshots table if it does not exist.
///
/// # Errors
///
/// Returns the database error if the statement fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(CREATE_SNAPSHOTS_TABLE).execute(pool).await?;
    Ok(())
}
