//! HORIZON — simulated tensile-testing bench.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod error;
pub mod curve;
pub mod analysis;
pub mod validation;
pub mod engine;
pub mod export;
pub mod dashboard;
