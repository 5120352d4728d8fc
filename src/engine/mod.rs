//! Core engine — sample queue, run sequencer, bench state and the tick timer.

pub mod queue;
pub mod sequencer;
pub mod bench;
pub mod runner;

pub use bench::{BenchSnapshot, RunTicket, TestBench};
pub use runner::{RunDriver, SharedBench};
pub use sequencer::{RunSequencer, TickOutcome};
