//! Whodunit: session snapshot storage.
//!
//! Each session is stored as a single record holding its full serialized
//! state. Saving replaces the record; there is no history.

pub mod memory_snapshot_repository;
pub mod pg_snapshot_repository;
pub mod schema;

pub use memory_snapshot_repository::InMemorySnapshotRepository;
pub use pg_snapshot_repository::PgSnapshotRepository;
