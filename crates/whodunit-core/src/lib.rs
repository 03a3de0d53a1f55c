//! Whodunit Core: shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that the session,
//! generation and storage crates depend on. It contains no infrastructure code.

pub mod clock;
pub mod command;
pub mod error;
pub mod repository;
pub mod rng;
