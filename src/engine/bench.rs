//! Test bench — the single owner of all bench state.
//!
//! Machine status, safety interlock, crosshead, sample queue and the run
//! sequencer live here. Every operator action goes through a method on
//! `TestBench`; guard failures leave state untouched and record a notice.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{info, warn};
use uuid::Uuid;

use super::queue::SampleQueue;
use super::sequencer::{RunSequencer, TickOutcome};
use crate::analysis::RunSummary;
use crate::config::BenchConfig;
use crate::curve::{generate, CurveParams, NoiseSource, UniformNoise};
use crate::error::{BenchError, BenchResult};
use crate::types::{
    format_stress, CurvePoint, Geometry, LiveMetrics, MachineStatus, Notice, RunOutcome,
    RunPhase, RunRecord, Sample, SequenceStep, StepState, TestMethod,
};
use crate::validation;

/// Notices kept for display.
const MAX_NOTICES: usize = 100;

/// Handle returned by a successful start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    pub generation: u64,
    pub sample_id: u32,
}

/// The run currently (or last) attached to a sample.
#[derive(Debug, Clone)]
struct ActiveRun {
    run_id: Uuid,
    sample_id: u32,
    started_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only view of the bench for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct BenchSnapshot {
    pub machine_status: MachineStatus,
    pub door_closed: bool,
    pub phase: RunPhase,
    pub is_running: bool,
    pub is_paused: bool,
    pub last_outcome: Option<RunOutcome>,
    pub force_limit_n: f64,
    pub live: LiveMetrics,
    pub progress: f64,
    pub cursor: usize,
    pub curve_len: usize,
    pub steps: Vec<StepView>,
    pub crosshead_mm: f64,
    pub selected_sample: Option<Sample>,
    pub operator: String,
    pub method: TestMethod,
    pub samples_total: usize,
    pub samples_completed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub step: SequenceStep,
    pub state: StepState,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Bench
// ---------------------------------------------------------------------------

pub struct TestBench {
    machine_status: MachineStatus,
    door_closed: bool,
    crosshead_mm: f64,
    max_travel_mm: f64,
    operator: String,
    method: TestMethod,
    speed: f64,
    default_geometry: Geometry,
    queue: SampleQueue,
    sequencer: RunSequencer,
    curve_params: CurveParams,
    noise: Box<dyn NoiseSource>,
    active: Option<ActiveRun>,
    last_outcome: Option<RunOutcome>,
    notices: VecDeque<Notice>,
    history: Vec<RunRecord>,
}

impl TestBench {
    pub fn new(config: &BenchConfig, curve_params: CurveParams) -> Self {
        let noise: Box<dyn NoiseSource> = match config.noise_seed {
            Some(seed) => Box::new(UniformNoise::seeded(seed)),
            None => Box::new(UniformNoise::from_entropy()),
        };
        Self::with_noise(config, curve_params, noise)
    }

    /// Build a bench with an explicit noise source.
    pub fn with_noise(
        config: &BenchConfig,
        curve_params: CurveParams,
        noise: Box<dyn NoiseSource>,
    ) -> Self {
        let queue = SampleQueue::new(&config.samples, config.geometry, config.method);
        info!(
            samples = queue.len(),
            machine = %config.machine_status,
            door_closed = config.door_closed,
            "Bench initialised"
        );
        Self {
            machine_status: config.machine_status,
            door_closed: config.door_closed,
            crosshead_mm: 0.0,
            max_travel_mm: config.max_travel_mm,
            operator: config.operator.clone(),
            method: config.method,
            speed: config.speed,
            default_geometry: config.geometry,
            queue,
            sequencer: RunSequencer::with_force_limit(config.force_limit_n),
            curve_params,
            noise,
            active: None,
            last_outcome: None,
            notices: VecDeque::new(),
            history: Vec::new(),
        }
    }

    // -- Run control -------------------------------------------------------

    /// Start a run on the selected sample.
    pub fn start_run(&mut self) -> BenchResult<RunTicket> {
        if self.sequencer.is_active() {
            return Err(self.refuse(BenchError::RunInProgress));
        }
        if self.machine_status != MachineStatus::Online {
            return Err(self.refuse(BenchError::MachineOffline));
        }
        if !self.door_closed {
            return Err(self.refuse(BenchError::InterlockOpen));
        }
        let Some(sample) = self.queue.selected().cloned() else {
            return Err(self.refuse(BenchError::NoSampleSelected));
        };

        if sample.is_completed() {
            self.notify(Notice::info(format!(
                "{} already tested ({}); the result will be overwritten",
                sample.name,
                sample.result_text()
            )));
        }

        let params = self.curve_params.for_geometry(&sample.geometry);
        let curve = generate(&params, self.noise.as_mut());
        let generation = self
            .sequencer
            .begin(curve, params.yield_strain)
            .ok_or(BenchError::RunInProgress)?;

        self.active = Some(ActiveRun {
            run_id: Uuid::new_v4(),
            sample_id: sample.id,
            started_at: Utc::now(),
        });
        info!(
            sample_id = sample.id,
            sample = %sample.name,
            generation,
            "Test started"
        );
        Ok(RunTicket {
            generation,
            sample_id: sample.id,
        })
    }

    /// Advance the run scheduled under `generation`.
    pub fn tick(&mut self, generation: u64) -> TickOutcome {
        let outcome = self.sequencer.tick(generation);
        match outcome {
            TickOutcome::Completed { peak_stress } => {
                self.finish_completed(peak_stress, RunOutcome::Completed);
            }
            TickOutcome::LimitReached { peak_stress, force } => {
                self.notify(Notice::warning(format!(
                    "Force limit reached: {force:.0} N (limit {:.0} N)",
                    self.sequencer.force_limit()
                )));
                self.finish_completed(peak_stress, RunOutcome::ForceLimit);
            }
            TickOutcome::Advanced | TickOutcome::Stale => {}
        }
        outcome
    }

    /// Manual stop, running or paused. The active sample keeps its previous
    /// status and result.
    pub fn stop_run(&mut self) -> BenchResult<()> {
        if !self.sequencer.abort() {
            return Err(BenchError::NotRunning);
        }
        let record = self.close_run(RunOutcome::Aborted, None);
        if let Some(record) = record {
            self.notify(Notice::info(format!(
                "Test on {} stopped after {} points",
                record.sample_name, record.points_collected
            )));
        }
        Ok(())
    }

    /// Hold the active run. Its generation is kept so `resume_run` can
    /// pick up at the same cursor.
    pub fn pause_run(&mut self) -> BenchResult<()> {
        if !self.sequencer.pause() {
            return Err(self.refuse(BenchError::NotRunning));
        }
        self.notify(Notice::info(format!(
            "Test paused at point {} of {}",
            self.sequencer.cursor(),
            self.sequencer.curve_len()
        )));
        Ok(())
    }

    /// Continue a paused run. The machine and interlock guards apply as
    /// they do on start.
    pub fn resume_run(&mut self) -> BenchResult<RunTicket> {
        if !self.sequencer.is_paused() {
            return Err(self.refuse(BenchError::NotPaused));
        }
        if self.machine_status != MachineStatus::Online {
            return Err(self.refuse(BenchError::MachineOffline));
        }
        if !self.door_closed {
            return Err(self.refuse(BenchError::InterlockOpen));
        }
        let sample_id = self.active_sample_id().ok_or(BenchError::NotPaused)?;
        let generation = self.sequencer.resume().ok_or(BenchError::NotPaused)?;
        info!(sample_id, generation, "Test resumed");
        Ok(RunTicket {
            generation,
            sample_id,
        })
    }

    fn finish_completed(&mut self, peak_stress: f64, outcome: RunOutcome) {
        let summary = RunSummary::from_points(
            self.sequencer.displayed(),
            self.curve_params.yield_strain,
        );
        let Some(record) = self.close_run(outcome, Some(summary)) else {
            return;
        };

        match self.queue.complete(record.sample_id, peak_stress) {
            Ok(sample) => {
                info!(
                    sample_id = sample.id,
                    sample = %sample.name,
                    result = %sample.result_text(),
                    "Test completed"
                );
                let msg = format!("{} completed: {}", sample.name, format_stress(peak_stress));
                self.notify(Notice::info(msg));
            }
            Err(e) => {
                // The sample was removed mid-run; nothing to write to.
                warn!(error = %e, "Completed run has no sample to record on");
            }
        }
    }

    /// Record the finished run and return the sequencer to idle.
    fn close_run(&mut self, outcome: RunOutcome, summary: Option<RunSummary>) -> Option<RunRecord> {
        self.sequencer.reset_to_idle();
        self.last_outcome = Some(outcome);
        let active = self.active.take()?;
        let sample_name = self
            .queue
            .get(active.sample_id)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let record = RunRecord {
            run_id: active.run_id,
            sample_id: active.sample_id,
            sample_name,
            outcome,
            points_collected: self.sequencer.displayed().len(),
            summary,
            started_at: active.started_at,
            finished_at: Utc::now(),
        };
        info!(
            run_id = %record.run_id,
            outcome = %record.outcome,
            points = record.points_collected,
            duration_ms = record.duration_ms(),
            "Run closed"
        );
        self.history.push(record.clone());
        Some(record)
    }

    // -- Machine controls --------------------------------------------------

    pub fn set_machine_status(&mut self, status: MachineStatus) {
        if self.machine_status != status {
            info!(from = %self.machine_status, to = %status, "Machine status changed");
            self.machine_status = status;
        }
    }

    pub fn set_door_closed(&mut self, closed: bool) {
        if self.door_closed != closed {
            info!(closed, "Safety door changed");
            self.door_closed = closed;
        }
    }

    /// Move the crosshead by `delta_mm`, clamped to the travel range.
    pub fn jog_crosshead(&mut self, delta_mm: f64) -> BenchResult<f64> {
        if self.sequencer.is_active() {
            return Err(self.refuse(BenchError::RunInProgress));
        }
        self.crosshead_mm = (self.crosshead_mm + delta_mm).clamp(0.0, self.max_travel_mm);
        info!(delta_mm, position_mm = self.crosshead_mm, "Crosshead jogged");
        Ok(self.crosshead_mm)
    }

    /// Zero the live force/extension readout.
    pub fn zero_sensors(&mut self) -> BenchResult<()> {
        if !self.sequencer.zero_live() {
            return Err(self.refuse(BenchError::RunInProgress));
        }
        info!("Sensors zeroed");
        Ok(())
    }

    // -- Samples -----------------------------------------------------------

    /// Validate and queue a new sample. Validation warnings become notices.
    pub fn add_sample(
        &mut self,
        name: Option<String>,
        geometry: Option<Geometry>,
    ) -> BenchResult<u32> {
        let geometry = geometry.unwrap_or(self.default_geometry);
        let report = validation::validate(self.method, &geometry, self.speed);
        if !report.is_valid() {
            return Err(self.refuse(BenchError::InvalidSample(report.errors.join("; "))));
        }
        if report.has_warnings() {
            warn!(count = report.warnings.len(), "Sample outside method recommendations");
        }
        for w in report.warnings {
            self.notify(Notice::warning(w));
        }
        Ok(self.queue.add(name, geometry, self.method))
    }

    pub fn remove_sample(&mut self, id: u32) -> BenchResult<Sample> {
        if self.sequencer.is_active() && self.active_sample_id() == Some(id) {
            return Err(self.refuse(BenchError::RunInProgress));
        }
        self.queue.remove(id).map_err(|e| self.refuse(e))
    }

    pub fn select_sample(&mut self, id: u32) -> BenchResult<()> {
        if self.sequencer.is_active() {
            return Err(self.refuse(BenchError::RunInProgress));
        }
        self.queue.select(id).map_err(|e| self.refuse(e))
    }

    // -- Notices -----------------------------------------------------------

    fn refuse(&mut self, err: BenchError) -> BenchError {
        warn!(reason = %err, "Action refused");
        self.notify(Notice::warning(err.to_string()));
        err
    }

    fn notify(&mut self, notice: Notice) {
        if self.notices.len() >= MAX_NOTICES {
            self.notices.pop_front();
        }
        self.notices.push_back(notice);
    }

    // -- Accessors ---------------------------------------------------------

    pub fn machine_status(&self) -> MachineStatus {
        self.machine_status
    }

    pub fn door_closed(&self) -> bool {
        self.door_closed
    }

    pub fn crosshead_mm(&self) -> f64 {
        self.crosshead_mm
    }

    pub fn is_running(&self) -> bool {
        self.sequencer.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.sequencer.is_paused()
    }

    /// A run holds the bench, ticking or paused.
    pub fn is_active(&self) -> bool {
        self.sequencer.is_active()
    }

    /// How the most recent run ended.
    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.last_outcome
    }

    /// Geometry given to new samples that don't specify their own.
    pub fn default_geometry(&self) -> Geometry {
        self.default_geometry
    }

    pub fn phase(&self) -> RunPhase {
        self.sequencer.phase()
    }

    pub fn generation(&self) -> u64 {
        self.sequencer.generation()
    }

    pub fn sequencer(&self) -> &RunSequencer {
        &self.sequencer
    }

    pub fn live(&self) -> LiveMetrics {
        self.sequencer.live()
    }

    pub fn displayed_curve(&self) -> &[CurvePoint] {
        self.sequencer.displayed()
    }

    pub fn samples(&self) -> &[Sample] {
        self.queue.as_slice()
    }

    pub fn sample(&self, id: u32) -> Option<&Sample> {
        self.queue.get(id)
    }

    pub fn selected_sample(&self) -> Option<&Sample> {
        self.queue.selected()
    }

    /// Sample the current run writes to, if a run is active.
    pub fn active_sample_id(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.sample_id)
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn history(&self) -> &[RunRecord] {
        &self.history
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn method(&self) -> TestMethod {
        self.method
    }

    pub fn snapshot(&self) -> BenchSnapshot {
        let steps = self
            .sequencer
            .steps()
            .iter()
            .map(|(step, state)| StepView {
                step,
                state,
                label: state.to_string(),
            })
            .collect();

        BenchSnapshot {
            machine_status: self.machine_status,
            door_closed: self.door_closed,
            phase: self.sequencer.phase(),
            is_running: self.sequencer.is_running(),
            is_paused: self.sequencer.is_paused(),
            last_outcome: self.last_outcome,
            force_limit_n: self.sequencer.force_limit(),
            live: self.sequencer.live(),
            progress: self.sequencer.progress(),
            cursor: self.sequencer.cursor(),
            curve_len: self.sequencer.curve_len(),
            steps,
            crosshead_mm: self.crosshead_mm,
            selected_sample: self.queue.selected().cloned(),
            operator: self.operator.clone(),
            method: self.method,
            samples_total: self.queue.len(),
            samples_completed: self.queue.completed_count(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
