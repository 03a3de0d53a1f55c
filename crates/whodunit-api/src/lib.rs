//! Whodunit: HTTP API library.
//!
//! Exposes configuration, error mapping, routes and shared state so the
//! binary and the integration tests build the same application.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
