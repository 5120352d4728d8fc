//! Run sequencer — the Idle → Running ⇄ Paused → {Completed, Aborted} → Idle
//! state machine.
//!
//! Each run owns a generation number. A tick carries the generation it was
//! scheduled for; once the run is paused, stopped or replaced the generation
//! (or phase) moves on and any late tick is ignored without touching state.

use tracing::{debug, info, warn};

use crate::analysis::peak_stress;
use crate::types::{CurvePoint, LiveMetrics, RunPhase, SequenceStep, StepBoard, StepState};

/// Fraction of the curve after which the peak step is shown active.
const PEAK_WINDOW: f64 = 0.9;

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// A point was appended; the run continues.
    Advanced,
    /// The curve is exhausted; carries the peak stress of the run.
    Completed { peak_stress: f64 },
    /// The next point would reach the force limit. The run ends without
    /// appending it.
    LimitReached { peak_stress: f64, force: f64 },
    /// The tick belongs to a paused, finished or replaced run and was ignored.
    Stale,
}

#[derive(Debug, Clone)]
pub struct RunSequencer {
    phase: RunPhase,
    generation: u64,
    cursor: usize,
    curve: Vec<CurvePoint>,
    displayed: Vec<CurvePoint>,
    live: LiveMetrics,
    steps: StepBoard,
    yield_strain: f64,
    force_limit: f64,
}

impl Default for RunSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSequencer {
    /// A sequencer with no force limit.
    pub fn new() -> Self {
        Self::with_force_limit(f64::INFINITY)
    }

    /// A sequencer that ends a run once a point's force reaches `force_limit` (N).
    pub fn with_force_limit(force_limit: f64) -> Self {
        Self {
            phase: RunPhase::Idle,
            generation: 0,
            cursor: 0,
            curve: Vec::new(),
            displayed: Vec::new(),
            live: LiveMetrics::default(),
            steps: StepBoard::default(),
            yield_strain: 0.0,
            force_limit,
        }
    }

    // -- Accessors ---------------------------------------------------------

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// True while ticks are being applied.
    pub fn is_running(&self) -> bool {
        self.phase.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.phase == RunPhase::Paused
    }

    /// True while a run holds the bench, paused or not.
    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn force_limit(&self) -> f64 {
        self.force_limit
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn curve_len(&self) -> usize {
        self.curve.len()
    }

    /// Points shown so far in the current (or last) run.
    pub fn displayed(&self) -> &[CurvePoint] {
        &self.displayed
    }

    pub fn live(&self) -> LiveMetrics {
        self.live
    }

    pub fn steps(&self) -> StepBoard {
        self.steps
    }

    /// Completed fraction of the current curve, 0.0–1.0.
    pub fn progress(&self) -> f64 {
        if self.curve.is_empty() {
            return if self.steps.all(StepState::Done) { 1.0 } else { 0.0 };
        }
        self.cursor as f64 / self.curve.len() as f64
    }

    // -- Transitions -------------------------------------------------------

    /// Start a new run on `curve`. Returns the run's generation, or `None`
    /// if a run is already active.
    pub fn begin(&mut self, curve: Vec<CurvePoint>, yield_strain: f64) -> Option<u64> {
        if self.is_active() {
            return None;
        }
        self.reset_to_idle();

        self.generation += 1;
        self.cursor = 0;
        self.displayed.clear();
        self.displayed.reserve(curve.len());
        self.curve = curve;
        self.yield_strain = yield_strain;
        self.steps = StepBoard::uniform(StepState::Pending);
        self.steps.set(SequenceStep::Grip, StepState::Done);
        self.steps.set(SequenceStep::Slack, StepState::Done);
        self.steps.set(SequenceStep::Main, StepState::Active);
        self.phase = RunPhase::Running;

        info!(
            generation = self.generation,
            points = self.curve.len(),
            "Run started"
        );
        Some(self.generation)
    }

    /// Advance the run scheduled under `generation` by one point.
    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        if generation != self.generation || !self.is_running() {
            debug!(
                tick_generation = generation,
                current = self.generation,
                phase = %self.phase,
                "Ignoring stale tick"
            );
            return TickOutcome::Stale;
        }

        if let Some(point) = self.curve.get(self.cursor).copied() {
            if point.force >= self.force_limit {
                warn!(
                    force = format!("{:.0}", point.force),
                    limit = format!("{:.0}", self.force_limit),
                    "Force limit reached"
                );
                let peak_stress = self.complete();
                return TickOutcome::LimitReached {
                    peak_stress,
                    force: point.force,
                };
            }

            self.displayed.push(point);
            self.live = LiveMetrics::from(&point);
            self.cursor += 1;
            self.update_steps(&point);

            if self.cursor % 25 == 0 {
                debug!(
                    cursor = self.cursor,
                    of = self.curve.len(),
                    stress = format!("{:.2}", point.stress),
                    "Run progress"
                );
            }
        }

        if self.cursor >= self.curve.len() {
            let peak_stress = self.complete();
            return TickOutcome::Completed { peak_stress };
        }
        TickOutcome::Advanced
    }

    /// Running → Paused. The generation is kept; ticks are ignored until
    /// `resume`. Returns false unless a run was ticking.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.phase = RunPhase::Paused;
        info!(cursor = self.cursor, of = self.curve.len(), "Run paused");
        true
    }

    /// Paused → Running under a fresh generation, so ticks scheduled before
    /// the pause stay stale.
    pub fn resume(&mut self) -> Option<u64> {
        if !self.is_paused() {
            return None;
        }
        self.generation += 1;
        self.phase = RunPhase::Running;
        info!(generation = self.generation, cursor = self.cursor, "Run resumed");
        Some(self.generation)
    }

    /// Manual stop: Running or Paused → Aborted. Returns false if no run
    /// was active.
    pub fn abort(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        // Invalidate any tick already scheduled for this run.
        self.generation += 1;
        self.phase = RunPhase::Aborted;
        self.steps = StepBoard::uniform(StepState::Pending);
        self.live = LiveMetrics::default();

        info!(
            cursor = self.cursor,
            of = self.curve.len(),
            "Run aborted"
        );
        true
    }

    /// Completed or Aborted → Idle. The last run's points, steps and live
    /// readout stay on display. Returns false from any other phase.
    pub fn reset_to_idle(&mut self) -> bool {
        if !matches!(self.phase, RunPhase::Completed | RunPhase::Aborted) {
            return false;
        }
        debug!(from = %self.phase, "Sequencer back to idle");
        self.phase = RunPhase::Idle;
        true
    }

    /// Zero the live readout. Refused while a run is active.
    pub fn zero_live(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        self.live = LiveMetrics::default();
        true
    }

    fn complete(&mut self) -> f64 {
        self.generation += 1;
        self.phase = RunPhase::Completed;
        self.steps = StepBoard::uniform(StepState::Done);
        let peak = peak_stress(&self.displayed);

        info!(
            points = self.displayed.len(),
            peak_stress = format!("{peak:.2}"),
            "Run completed"
        );
        peak
    }

    fn update_steps(&mut self, point: &CurvePoint) {
        if point.strain >= self.yield_strain
            && self.steps.get(SequenceStep::Main) == StepState::Active
        {
            self.steps.set(SequenceStep::Main, StepState::Done);
            self.steps.set(SequenceStep::Buffer, StepState::Active);
        }
        if self.progress() >= PEAK_WINDOW && self.steps.get(SequenceStep::Peak) == StepState::Pending
        {
            self.steps.set(SequenceStep::Main, StepState::Done);
            self.steps.set(SequenceStep::Buffer, StepState::Done);
            self.steps.set(SequenceStep::Peak, StepState::Active);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
