//! Shared types for the HORIZON bench.
//!
//! These types form the data model used across all modules. The engine,
//! export and dashboard modules depend on them without depending on each
//! other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::analysis::RunSummary;

/// Placeholder shown in place of a missing result.
pub const RESULT_PLACEHOLDER: &str = "-";

// ---------------------------------------------------------------------------
// Test method
// ---------------------------------------------------------------------------

/// Testing standard a specimen is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestMethod {
    #[serde(rename = "ISO 527-2")]
    Iso527_2,
    #[serde(rename = "ASTM D638")]
    AstmD638,
}

impl TestMethod {
    pub const ALL: &'static [TestMethod] = &[TestMethod::Iso527_2, TestMethod::AstmD638];

    pub fn name(&self) -> &'static str {
        match self {
            TestMethod::Iso527_2 => "ISO 527-2",
            TestMethod::AstmD638 => "ASTM D638",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TestMethod::Iso527_2 => "Plastics - Determination of tensile properties - Part 2",
            TestMethod::AstmD638 => "Standard Test Method for Tensile Properties of Plastics",
        }
    }

    /// Recommended crosshead speed in mm/min.
    pub fn default_speed(&self) -> f64 {
        5.0
    }

    /// Recommended gauge length in mm.
    pub fn default_gauge_length(&self) -> f64 {
        50.0
    }
}

impl Default for TestMethod {
    fn default() -> Self {
        TestMethod::Iso527_2
    }
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for TestMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "iso5272" | "iso527" => Ok(TestMethod::Iso527_2),
            "astmd638" | "d638" => Ok(TestMethod::AstmD638),
            _ => {
                let known: Vec<&str> = TestMethod::ALL.iter().map(|m| m.name()).collect();
                Err(anyhow::anyhow!(
                    "Unknown test method: {s} (expected one of: {})",
                    known.join(", ")
                ))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleStatus {
    Ready,
    Completed,
}

impl fmt::Display for SampleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleStatus::Ready => write!(f, "Ready"),
            SampleStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// Specimen dimensions in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    pub width: f64,
    pub thickness: f64,
    pub gauge_length: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            width: 10.0,
            thickness: 4.0,
            gauge_length: TestMethod::default().default_gauge_length(),
        }
    }
}

impl Geometry {
    /// Cross-section area in mm².
    pub fn cross_section(&self) -> f64 {
        self.width * self.thickness
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.1}x{:.1}x{:.1} mm",
            self.width, self.thickness, self.gauge_length
        )
    }
}

/// A test article in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub id: u32,
    pub name: String,
    pub status: SampleStatus,
    /// Peak stress in MPa, set when a run on this sample completes.
    pub result: Option<f64>,
    pub geometry: Geometry,
    pub method: TestMethod,
    pub created_at: DateTime<Utc>,
}

impl Sample {
    pub fn new(id: u32, name: impl Into<String>, geometry: Geometry, method: TestMethod) -> Self {
        Self {
            id,
            name: name.into(),
            status: SampleStatus::Ready,
            result: None,
            geometry,
            method,
            created_at: Utc::now(),
        }
    }

    /// Result as shown to the operator: `"74.12 MPa"` or `"-"`.
    pub fn result_text(&self) -> String {
        match self.result {
            Some(peak) => format_stress(peak),
            None => RESULT_PLACEHOLDER.to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SampleStatus::Completed
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({}) [{}] {}",
            self.id,
            self.name,
            self.geometry,
            self.status,
            self.result_text()
        )
    }
}

/// Format a stress value with its unit.
pub fn format_stress(mpa: f64) -> String {
    format!("{mpa:.2} MPa")
}

// ---------------------------------------------------------------------------
// Curve & live metrics
// ---------------------------------------------------------------------------

/// One synthetic (strain, stress, force, extension) tuple.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Strain in %.
    pub strain: f64,
    /// Stress in MPa.
    pub stress: f64,
    /// Force in N.
    pub force: f64,
    /// Extension in mm.
    pub extension: f64,
}

/// Snapshot of the most recently displayed curve point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LiveMetrics {
    pub force: f64,
    pub extension: f64,
    pub stress: f64,
    pub strain: f64,
}

impl From<&CurvePoint> for LiveMetrics {
    fn from(p: &CurvePoint) -> Self {
        Self {
            force: p.force,
            extension: p.extension,
            stress: p.stress,
            strain: p.strain,
        }
    }
}

impl fmt::Display for LiveMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "F={:.1} N | ext={:.3} mm | σ={:.2} MPa | ε={:.2} %",
            self.force, self.extension, self.stress, self.strain
        )
    }
}

// ---------------------------------------------------------------------------
// Machine & run state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineStatus {
    Online,
    Offline,
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineStatus::Online => write!(f, "Online"),
            MachineStatus::Offline => write!(f, "Offline"),
        }
    }
}

impl std::str::FromStr for MachineStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(MachineStatus::Online),
            "offline" => Ok(MachineStatus::Offline),
            _ => Err(anyhow::anyhow!("Unknown machine status: {s}")),
        }
    }
}

/// Lifecycle of a simulated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Idle,
    Running,
    Paused,
    Completed,
    Aborted,
}

impl RunPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, RunPhase::Running)
    }

    /// A run holds the bench, ticking or paused.
    pub fn is_active(&self) -> bool {
        matches!(self, RunPhase::Running | RunPhase::Paused)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "Idle"),
            RunPhase::Running => write!(f, "Running"),
            RunPhase::Paused => write!(f, "Paused"),
            RunPhase::Completed => write!(f, "Completed"),
            RunPhase::Aborted => write!(f, "Aborted"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    Completed,
    /// Ended early at the machine's force limit; the result is still recorded.
    ForceLimit,
    Aborted,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "Completed"),
            RunOutcome::ForceLimit => write!(f, "Force limit"),
            RunOutcome::Aborted => write!(f, "Aborted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sequence steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceStep {
    Grip,
    Slack,
    Main,
    Buffer,
    Peak,
}

impl SequenceStep {
    pub const ALL: &'static [SequenceStep] = &[
        SequenceStep::Grip,
        SequenceStep::Slack,
        SequenceStep::Main,
        SequenceStep::Buffer,
        SequenceStep::Peak,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SequenceStep::Grip => "grip",
            SequenceStep::Slack => "slack",
            SequenceStep::Main => "main",
            SequenceStep::Buffer => "buffer",
            SequenceStep::Peak => "peak",
        }
    }
}

impl fmt::Display for SequenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    Pending,
    Active,
    Done,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepState::Pending => write!(f, "Ready"),
            StepState::Active => write!(f, "Active"),
            StepState::Done => write!(f, "Done"),
        }
    }
}

/// State of every step label, in sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepBoard {
    states: [StepState; 5],
}

impl Default for StepBoard {
    fn default() -> Self {
        Self::uniform(StepState::Pending)
    }
}

impl StepBoard {
    pub fn uniform(state: StepState) -> Self {
        Self { states: [state; 5] }
    }

    fn index(step: SequenceStep) -> usize {
        match step {
            SequenceStep::Grip => 0,
            SequenceStep::Slack => 1,
            SequenceStep::Main => 2,
            SequenceStep::Buffer => 3,
            SequenceStep::Peak => 4,
        }
    }

    pub fn get(&self, step: SequenceStep) -> StepState {
        self.states[Self::index(step)]
    }

    pub fn set(&mut self, step: SequenceStep, state: StepState) {
        self.states[Self::index(step)] = state;
    }

    pub fn iter(&self) -> impl Iterator<Item = (SequenceStep, StepState)> + '_ {
        SequenceStep::ALL.iter().map(|s| (*s, self.get(*s)))
    }

    pub fn all(&self, state: StepState) -> bool {
        self.states.iter().all(|s| *s == state)
    }
}

// ---------------------------------------------------------------------------
// Notices & history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Transient operator-facing message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "INFO",
            NoticeLevel::Warning => "WARN",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// One finished run, kept for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub sample_id: u32,
    pub sample_name: String,
    pub outcome: RunOutcome,
    pub points_collected: usize,
    pub summary: Option<RunSummary>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunRecord {
    /// Run duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
