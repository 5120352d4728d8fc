use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use horizon_utm::config::BenchConfig;
use horizon_utm::curve::{CurveParams, NoiseSource, UniformNoise};
use horizon_utm::engine::{RunDriver, TestBench};

pub const TICK: Duration = Duration::from_millis(50);

pub fn params(points: usize) -> CurveParams {
    CurveParams {
        points,
        ..CurveParams::default()
    }
}

pub fn driver_with(config: &BenchConfig, points: usize, noise: Box<dyn NoiseSource>) -> RunDriver {
    let bench = TestBench::with_noise(config, params(points), noise);
    RunDriver::new(Arc::new(RwLock::new(bench)), TICK)
}

/// Default bench (A-101, A-102; Online; door closed) with seeded noise.
pub fn driver(points: usize) -> RunDriver {
    driver_with(
        &BenchConfig::default(),
        points,
        Box::new(UniformNoise::seeded(42)),
    )
}
