//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the path in `HORIZON_CONFIG`) and deserializes
//! into strongly-typed structs. Every field has a default, so a partial or
//! missing file still yields a working bench.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::curve::CurveParams;
use crate::types::{Geometry, MachineStatus, TestMethod};
use crate::validation;

/// Env var that overrides the config file path.
pub const CONFIG_PATH_ENV: &str = "HORIZON_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub bench: BenchConfig,
    pub curve: CurveParams,
    pub run: RunConfig,
    pub export: ExportConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BenchConfig {
    pub operator: String,
    pub method: TestMethod,
    pub machine_status: MachineStatus,
    pub door_closed: bool,
    /// Names of the samples queued at startup.
    pub samples: Vec<String>,
    /// Geometry given to new samples.
    pub geometry: Geometry,
    /// Crosshead speed in mm/min.
    pub speed: f64,
    /// Crosshead travel limit in mm.
    pub max_travel_mm: f64,
    /// Load cell capacity in N; a run ends when a point reaches it.
    pub force_limit_n: f64,
    /// Fixed noise seed; unseeded when absent.
    pub noise_seed: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        let method = TestMethod::default();
        Self {
            operator: "Operator".to_string(),
            method,
            machine_status: MachineStatus::Online,
            door_closed: true,
            samples: vec!["A-101".to_string(), "A-102".to_string()],
            geometry: Geometry::default(),
            speed: method.default_speed(),
            max_travel_mm: 1000.0,
            force_limit_n: 10_000.0,
            noise_seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RunConfig {
    pub tick_interval_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExportConfig {
    pub dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            dir: "exports".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            warn!(path, "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// The config path: `HORIZON_CONFIG` if set, else `config.toml`.
    pub fn resolve_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.curve.validate()?;
        if !(10..=1000).contains(&self.run.tick_interval_ms) {
            bail!(
                "run.tick_interval_ms must be within 10..=1000 (got {})",
                self.run.tick_interval_ms
            );
        }
        if self.bench.max_travel_mm <= 0.0 {
            bail!("bench.max_travel_mm must be positive");
        }
        if !(100.0..=100_000.0).contains(&self.bench.force_limit_n) {
            bail!(
                "bench.force_limit_n must be within 100..=100000 N (got {})",
                self.bench.force_limit_n
            );
        }
        if let Some(i) = self.bench.samples.iter().position(|n| n.trim().is_empty()) {
            bail!("bench.samples[{i}] must have a name");
        }
        let report = validation::validate(self.bench.method, &self.bench.geometry, self.bench.speed);
        if !report.is_valid() {
            bail!("bench geometry/speed rejected: {}", report.errors.join("; "));
        }
        if self.export.dir.trim().is_empty() {
            bail!("export.dir must not be empty");
        }
        Ok(())
    }
}
