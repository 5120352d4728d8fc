//! Sample export.
//!
//! Writes a plain key/value document per sample and a CSV of the whole
//! queue. Neither format is versioned.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::{Geometry, Sample, TestMethod};

// ---------------------------------------------------------------------------
// Single-sample document
// ---------------------------------------------------------------------------

/// Everything that goes into one sample's export document.
#[derive(Debug, Clone)]
pub struct SampleReport {
    pub method: TestMethod,
    pub sample_name: String,
    pub result: String,
    pub geometry: Geometry,
    pub operator: String,
    pub timestamp: DateTime<Utc>,
}

impl SampleReport {
    pub fn from_sample(sample: &Sample, operator: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            method: sample.method,
            sample_name: sample.name.clone(),
            result: sample.result_text(),
            geometry: sample.geometry,
            operator: operator.to_string(),
            timestamp,
        }
    }

    /// Render as `Key: value` lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Method: {}", self.method);
        let _ = writeln!(out, "Sample: {}", self.sample_name);
        let _ = writeln!(out, "Result: {}", self.result);
        let _ = writeln!(out, "Width (mm): {:.2}", self.geometry.width);
        let _ = writeln!(out, "Thickness (mm): {:.2}", self.geometry.thickness);
        let _ = writeln!(out, "Gauge Length (mm): {:.1}", self.geometry.gauge_length);
        let _ = writeln!(out, "Operator: {}", self.operator);
        let _ = writeln!(out, "Timestamp: {}", self.timestamp.to_rfc3339());
        out
    }

    /// File name derived from the sample name.
    pub fn file_name(&self) -> String {
        format!("{}.txt", sanitize_file_stem(&self.sample_name))
    }

    /// Write the document into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export dir {}", dir.display()))?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.render())
            .with_context(|| format!("Failed to write export {}", path.display()))?;

        info!(path = %path.display(), sample = %self.sample_name, "Sample exported");
        Ok(path)
    }
}

/// Replace anything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "sample".to_string()
    } else {
        stem
    }
}

// ---------------------------------------------------------------------------
// Queue CSV
// ---------------------------------------------------------------------------

const CSV_HEADER: &[&str] = &[
    "Sample ID",
    "Sample Name",
    "Status",
    "Result",
    "Method",
    "Width (mm)",
    "Thickness (mm)",
    "Gauge Length (mm)",
    "Cross Section (mm²)",
    "Created",
];

/// Render every sample as one CSV row.
pub fn queue_csv(samples: &[Sample]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');

    for s in samples {
        let fields = [
            s.id.to_string(),
            escape_csv_field(&s.name),
            s.status.to_string(),
            escape_csv_field(&s.result_text()),
            escape_csv_field(s.method.name()),
            format!("{:.2}", s.geometry.width),
            format!("{:.2}", s.geometry.thickness),
            format!("{:.1}", s.geometry.gauge_length),
            format!("{:.2}", s.geometry.cross_section()),
            s.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Write the queue CSV to `path`.
pub fn write_queue_csv(samples: &[Sample], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create export dir {}", parent.display()))?;
    }
    std::fs::write(path, queue_csv(samples))
        .with_context(|| format!("Failed to write CSV {}", path.display()))?;
    info!(path = %path.display(), samples = samples.len(), "Queue exported to CSV");
    Ok(())
}

/// Quote a field containing a comma, quote or newline; double inner quotes.
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
