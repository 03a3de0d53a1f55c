//! Application services: the orchestration engine and its collaborators.

pub mod broadcast;
pub mod engine;
pub mod locks;
pub mod query_handlers;
pub mod state_store;
