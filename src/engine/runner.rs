//! Run driver — the timer that feeds the sequencer.
//!
//! One tokio task per run ticks on a fixed period. Every tick takes the
//! bench write lock and carries the generation it was started with, so a
//! stop (which bumps the generation under the same lock) wins over any
//! tick already waiting for the lock.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::bench::{RunTicket, TestBench};
use super::sequencer::TickOutcome;
use crate::error::BenchResult;

pub type SharedBench = Arc<RwLock<TestBench>>;

pub struct RunDriver {
    bench: SharedBench,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RunDriver {
    pub fn new(bench: SharedBench, period: Duration) -> Self {
        Self {
            bench,
            period,
            task: Mutex::new(None),
        }
    }

    pub fn bench(&self) -> &SharedBench {
        &self.bench
    }

    /// Start a run and its tick task.
    pub async fn start(&self) -> BenchResult<RunTicket> {
        let mut task = self.task.lock().await;
        let ticket = self.bench.write().await.start_run()?;

        self.arm(&mut task, ticket.generation);
        Ok(ticket)
    }

    /// Pause the active run and cancel its tick task. The cursor is kept.
    pub async fn pause(&self) -> BenchResult<()> {
        let mut task = self.task.lock().await;
        self.bench.write().await.pause_run()?;
        if let Some(handle) = task.take() {
            handle.abort();
        }
        Ok(())
    }

    /// Resume a paused run with a new tick task.
    pub async fn resume(&self) -> BenchResult<RunTicket> {
        let mut task = self.task.lock().await;
        let ticket = self.bench.write().await.resume_run()?;
        self.arm(&mut task, ticket.generation);
        Ok(ticket)
    }

    /// Stop the active run. The generation moves on before the task is
    /// cancelled, so no tick can land after this returns.
    pub async fn stop(&self) -> BenchResult<()> {
        let mut task = self.task.lock().await;
        self.bench.write().await.stop_run()?;
        if let Some(handle) = task.take() {
            handle.abort();
        }
        Ok(())
    }

    /// Whether a run holds the bench, ticking or paused.
    pub async fn is_active(&self) -> bool {
        self.bench.read().await.is_active()
    }

    /// Wait for the current tick task to finish on its own.
    pub async fn wait(&self) {
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            // An aborted task reports a JoinError; either way it's done.
            let _ = handle.await;
        }
    }

    fn arm(&self, task: &mut Option<JoinHandle<()>>, generation: u64) {
        if let Some(old) = task.take() {
            // A finished run's task has already returned; this only reaps it.
            old.abort();
        }
        *task = Some(tokio::spawn(tick_loop(
            self.bench.clone(),
            generation,
            self.period,
        )));
        info!(
            generation,
            period_ms = self.period.as_millis() as u64,
            "Tick task spawned"
        );
    }
}

async fn tick_loop(bench: SharedBench, generation: u64, period: Duration) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let outcome = bench.write().await.tick(generation);
        match outcome {
            TickOutcome::Advanced => continue,
            TickOutcome::Completed { peak_stress } => {
                debug!(generation, peak_stress, "Tick task finished: run completed");
                break;
            }
            TickOutcome::LimitReached { force, .. } => {
                debug!(generation, force, "Tick task finished: force limit");
                break;
            }
            TickOutcome::Stale => {
                debug!(generation, "Tick task finished: run superseded");
                break;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
