use mockall::mock;
use tokio_test::assert_ok;

use horizon_utm::config::BenchConfig;
use horizon_utm::curve::{generate, Noiseless, NoiseSource};
use horizon_utm::types::SampleStatus;

use crate::common::{driver_with, params};

mock! {
    pub Noise {}
    impl NoiseSource for Noise {
        fn perturbation(&mut self, amplitude: f64) -> f64;
    }
}

#[tokio::test(start_paused = true)]
async fn result_is_peak_of_noiseless_curve() {
    let expected = generate(&params(50), &mut Noiseless)
        .iter()
        .map(|p| p.stress)
        .fold(0.0, f64::max);

    let d = driver_with(&BenchConfig::default(), 50, Box::new(Noiseless));
    assert_ok!(d.start().await);
    d.wait().await;

    let bench = d.bench().read().await;
    let sample = bench.sample(1).unwrap();
    assert_eq!(sample.status, SampleStatus::Completed);
    assert_eq!(sample.result, Some(expected));
}

#[tokio::test(start_paused = true)]
async fn noise_is_drawn_once_per_point() {
    let mut noise = MockNoise::new();
    noise
        .expect_perturbation()
        .times(30)
        .returning(|amplitude| -amplitude);

    let d = driver_with(&BenchConfig::default(), 30, Box::new(noise));
    assert_ok!(d.start().await);
    d.wait().await;

    let bench = d.bench().read().await;
    assert_eq!(bench.displayed_curve().len(), 30);
    assert!(bench.displayed_curve().iter().all(|p| p.stress >= 0.0));
}
