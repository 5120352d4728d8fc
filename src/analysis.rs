//! Run summary: descriptive figures computed from the collected points.

use serde::{Deserialize, Serialize};

use crate::types::CurvePoint;

/// Summary of the points collected during one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Maximum stress (MPa).
    pub peak_stress: f64,
    /// Strain at the first occurrence of the peak (%).
    pub strain_at_peak: f64,
    /// Maximum force (N).
    pub peak_force: f64,
    /// Stress of the last collected point (MPa).
    pub break_stress: f64,
    /// Strain of the last collected point (%).
    pub break_strain: f64,
    pub points: usize,
    /// Least-squares slope over the elastic points (MPa per %).
    pub modulus_estimate: Option<f64>,
}

impl RunSummary {
    /// Summarise `points`; `yield_strain` bounds the elastic region used for
    /// the modulus estimate.
    pub fn from_points(points: &[CurvePoint], yield_strain: f64) -> Self {
        let (peak_stress, strain_at_peak) = peak_of(points)
            .map(|p| (p.stress, p.strain))
            .unwrap_or((0.0, 0.0));
        let peak_force = points.iter().map(|p| p.force).fold(0.0, f64::max);
        let (break_stress, break_strain) = points
            .last()
            .map(|p| (p.stress, p.strain))
            .unwrap_or((0.0, 0.0));

        let elastic: Vec<(f64, f64)> = points
            .iter()
            .filter(|p| p.strain < yield_strain)
            .map(|p| (p.strain, p.stress))
            .collect();

        Self {
            peak_stress,
            strain_at_peak,
            peak_force,
            break_stress,
            break_strain,
            points: points.len(),
            modulus_estimate: linear_slope(&elastic),
        }
    }
}

/// Maximum stress over `points`, 0.0 when empty.
pub fn peak_stress(points: &[CurvePoint]) -> f64 {
    peak_of(points).map(|p| p.stress).unwrap_or(0.0)
}

fn peak_of(points: &[CurvePoint]) -> Option<&CurvePoint> {
    points.iter().fold(None, |best: Option<&CurvePoint>, p| match best {
        Some(b) if b.stress >= p.stress => Some(b),
        _ => Some(p),
    })
}

/// Ordinary least-squares slope of y over x. None with fewer than two
/// points or no spread in x.
fn linear_slope(xy: &[(f64, f64)]) -> Option<f64> {
    if xy.len() < 2 {
        return None;
    }
    let n = xy.len() as f64;
    let x_mean = xy.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = xy.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (num, den) = xy.iter().fold((0.0, 0.0), |(num, den), (x, y)| {
        let dx = x - x_mean;
        (num + dx * (y - y_mean), den + dx * dx)
    });

    if den == 0.0 {
        None
    } else {
        Some(num / den)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
