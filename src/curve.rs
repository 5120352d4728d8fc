//! Synthetic stress/strain curve generation.
//!
//! Produces an idealized elastic-then-hardening response with a uniform
//! perturbation on every stress sample. The random source is injected so
//! that tests can make the curve deterministic.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::types::{CurvePoint, Geometry};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Shape of the synthetic curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveParams {
    /// Number of points to generate.
    pub points: usize,
    /// Strain increment per point (%).
    pub strain_step: f64,
    /// Elastic slope (MPa per % strain).
    pub modulus: f64,
    /// Strain at which the hardening branch takes over (%).
    pub yield_strain: f64,
    /// Hardening coefficient applied to sqrt(strain - yield).
    pub hardening: f64,
    /// Half-width of the uniform noise band (MPa).
    pub noise_amplitude: f64,
    /// Force scaling: N per MPa (the cross-section in mm²).
    pub cross_section: f64,
    /// Gauge length used to derive extension from strain (mm).
    pub gauge_length: f64,
}

impl Default for CurveParams {
    fn default() -> Self {
        Self {
            points: 100,
            strain_step: 0.1,
            modulus: 25.0,
            yield_strain: 2.0,
            hardening: 10.0,
            noise_amplitude: 1.0,
            cross_section: 40.0,
            gauge_length: 50.0,
        }
    }
}

impl CurveParams {
    /// Same shape, scaled to a specimen's geometry.
    pub fn for_geometry(&self, geometry: &Geometry) -> Self {
        Self {
            cross_section: geometry.cross_section(),
            gauge_length: geometry.gauge_length,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.points == 0 {
            bail!("curve.points must be at least 1");
        }
        if self.strain_step <= 0.0 {
            bail!("curve.strain_step must be positive (got {})", self.strain_step);
        }
        if self.modulus <= 0.0 {
            bail!("curve.modulus must be positive (got {})", self.modulus);
        }
        if self.yield_strain < 0.0 {
            bail!("curve.yield_strain must not be negative");
        }
        if self.hardening < 0.0 || self.noise_amplitude < 0.0 {
            bail!("curve.hardening and curve.noise_amplitude must not be negative");
        }
        if self.cross_section <= 0.0 || self.gauge_length <= 0.0 {
            bail!("curve geometry must be positive");
        }
        Ok(())
    }

    /// The noiseless stress at a given strain.
    pub fn ideal_stress(&self, strain: f64) -> f64 {
        if strain < self.yield_strain {
            self.modulus * strain
        } else {
            self.modulus * self.yield_strain
                + self.hardening * (strain - self.yield_strain).sqrt()
        }
    }

    /// Strain of the point at `index`.
    pub fn strain_at(&self, index: usize) -> f64 {
        index as f64 * self.strain_step
    }
}

// ---------------------------------------------------------------------------
// Noise
// ---------------------------------------------------------------------------

/// Source of the per-point stress perturbation.
#[cfg_attr(test, mockall::automock)]
pub trait NoiseSource: Send + Sync {
    /// A value in `[-amplitude, amplitude]`.
    fn perturbation(&mut self, amplitude: f64) -> f64;
}

/// Uniform noise drawn from any `rand` generator.
pub struct UniformNoise<R> {
    rng: R,
}

impl<R: Rng + Send + Sync> UniformNoise<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl UniformNoise<StdRng> {
    /// Unseeded: every curve looks alike but never identical.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send + Sync> NoiseSource for UniformNoise<R> {
    fn perturbation(&mut self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-amplitude..=amplitude)
    }
}

/// No perturbation at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct Noiseless;

impl NoiseSource for Noiseless {
    fn perturbation(&mut self, _amplitude: f64) -> f64 {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Generate exactly `params.points` curve points.
pub fn generate(params: &CurveParams, noise: &mut dyn NoiseSource) -> Vec<CurvePoint> {
    (0..params.points)
        .map(|i| {
            let strain = params.strain_at(i);
            let stress = (params.ideal_stress(strain) + noise.perturbation(params.noise_amplitude))
                .max(0.0);
            CurvePoint {
                strain,
                stress,
                force: stress * params.cross_section,
                extension: strain * params.gauge_length / 100.0,
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
