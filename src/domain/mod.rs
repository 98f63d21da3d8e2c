//! Core domain types and evaluation logic.

pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod feed;
pub mod market;
pub mod metrics;
pub mod portfolio;
pub mod quote;
pub mod runner;
pub mod strategy;
pub mod universe;
