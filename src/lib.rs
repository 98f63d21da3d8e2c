//! quoteval: event-driven strategy evaluator over quote data.
//!
//! Hexagonal architecture: evaluation logic in [`domain`], port traits in
//! [`ports`], file-backed implementations in [`adapters`], built-in traders in
//! [`strategies`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
pub mod strategies;
