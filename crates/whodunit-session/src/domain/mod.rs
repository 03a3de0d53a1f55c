//! Domain model: session state, phase graph, commands and scripts.

pub mod commands;
pub mod phase;
pub mod script;
pub mod state;
