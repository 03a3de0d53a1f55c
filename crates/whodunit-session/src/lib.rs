//! Whodunit: game session orchestration context.
//!
//! Responsible for the session state of a running mystery, the phase graph
//! that governs how a session moves between acts and phases, and the engine
//! that applies player actions, calls the generation adapter, persists
//! snapshots and fans Q&A exchanges out to the other characters' memory.

pub mod application;
pub mod domain;
