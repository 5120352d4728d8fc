//! Specimen parameter checks per test method.
//!
//! Hard errors reject a sample outright; warnings are passed on to the
//! operator as notices and never block anything.

use serde::Serialize;

use crate::types::{Geometry, TestMethod};

/// Accepted crosshead speed range (mm/min).
pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 500.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn error(&mut self, msg: String) {
        self.errors.push(msg);
    }

    fn warn(&mut self, msg: String) {
        self.warnings.push(msg);
    }
}

/// Validate specimen geometry and test speed for `method`.
pub fn validate(method: TestMethod, geometry: &Geometry, speed: f64) -> ValidationReport {
    let mut report = ValidationReport::default();

    if !dimensions_ok(geometry) {
        report.error(format!("Invalid sample dimensions: {geometry}"));
        return report;
    }
    if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
        report.error(format!("Invalid speed: {speed:.2} mm/min"));
        return report;
    }

    match method {
        TestMethod::Iso527_2 => check_iso_527_2(&mut report, geometry, speed),
        TestMethod::AstmD638 => check_astm_d638(&mut report, geometry, speed),
    }
    report
}

fn dimensions_ok(g: &Geometry) -> bool {
    (g.width > 0.0 && g.width <= 100.0)
        && (g.thickness > 0.0 && g.thickness <= 50.0)
        && (g.gauge_length > 0.0 && g.gauge_length <= 500.0)
}

fn check_speed_band(report: &mut ValidationReport, method: TestMethod, speed: f64) {
    if speed < 1.0 {
        report.warn(format!("Speed {speed:.2} mm/min may be too slow for {method}"));
    }
    if speed > 50.0 {
        report.warn(format!("Speed {speed:.2} mm/min may be too fast for {method}"));
    }
}

fn check_gauge(report: &mut ValidationReport, method: TestMethod, gauge_length: f64) {
    if !(45.0..=55.0).contains(&gauge_length) {
        report.warn(format!(
            "Gauge length {gauge_length:.1} mm is outside typical range (50 ± 5 mm) for {method}"
        ));
    }
}

// Type 1A specimen
fn check_iso_527_2(report: &mut ValidationReport, g: &Geometry, speed: f64) {
    let method = TestMethod::Iso527_2;
    if !(9.5..=10.5).contains(&g.width) {
        report.warn(format!(
            "Width {:.2} mm is outside typical range (10 ± 0.5 mm) for {method}",
            g.width
        ));
    }
    if !(3.5..=4.5).contains(&g.thickness) {
        report.warn(format!(
            "Thickness {:.2} mm is outside typical range (4 ± 0.5 mm) for {method}",
            g.thickness
        ));
    }
    check_gauge(report, method, g.gauge_length);
    check_speed_band(report, method, speed);
    if !(4.0..=6.0).contains(&speed) {
        report.warn("Recommended speed for many plastics is 5 mm/min".to_string());
    }
}

// Type I specimen
fn check_astm_d638(report: &mut ValidationReport, g: &Geometry, speed: f64) {
    let method = TestMethod::AstmD638;
    if !(12.0..=14.0).contains(&g.width) {
        report.warn(format!(
            "Width {:.2} mm is outside typical range (13 ± 1 mm) for {method} Type I",
            g.width
        ));
    }
    if !(2.0..=15.0).contains(&g.thickness) {
        report.warn(format!(
            "Thickness {:.2} mm is outside typical range for {method}",
            g.thickness
        ));
    }
    check_gauge(report, method, g.gauge_length);
    check_speed_band(report, method, speed);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
