use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

use horizon_utm::analysis::peak_stress;
use horizon_utm::config::BenchConfig;
use horizon_utm::curve::Noiseless;
use horizon_utm::error::BenchError;
use horizon_utm::types::{
    format_stress, MachineStatus, RunOutcome, RunPhase, SampleStatus, StepState,
};

use crate::common::{driver, driver_with, TICK};

#[tokio::test(start_paused = true)]
async fn a101_runs_to_completion() {
    let d = driver(100);
    let ticket = assert_ok!(d.start().await);
    assert_eq!(ticket.sample_id, 1);

    d.wait().await;
    let bench = d.bench().read().await;
    assert_eq!(bench.phase(), RunPhase::Idle);
    assert_eq!(bench.last_outcome(), Some(RunOutcome::Completed));
    assert!(!bench.is_active());
    assert_eq!(bench.displayed_curve().len(), 100);
    assert!(bench.sequencer().steps().all(StepState::Done));

    let sample = bench.sample(1).unwrap();
    let peak = peak_stress(bench.displayed_curve());
    assert_eq!(sample.status, SampleStatus::Completed);
    assert_eq!(sample.result, Some(peak));
    assert_eq!(sample.result_text(), format_stress(peak));
    assert!(sample.result_text().ends_with(" MPa"));

    let record = bench.history().last().unwrap();
    assert_eq!(record.outcome, RunOutcome::Completed);
    assert_eq!(record.points_collected, 100);
    assert_eq!(record.summary.as_ref().unwrap().peak_stress, peak);
}

#[tokio::test(start_paused = true)]
async fn stop_before_exhaustion_keeps_sample_ready() {
    let d = driver(100);
    assert_ok!(d.start().await);
    tokio::time::sleep(TICK * 30 + Duration::from_millis(10)).await;
    assert_ok!(d.stop().await);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let bench = d.bench().read().await;
    assert_eq!(bench.phase(), RunPhase::Idle);
    assert_eq!(bench.last_outcome(), Some(RunOutcome::Aborted));
    assert!(!bench.is_active());
    assert_eq!(bench.displayed_curve().len(), 30);

    let sample = bench.sample(1).unwrap();
    assert_eq!(sample.status, SampleStatus::Ready);
    assert_eq!(sample.result_text(), "-");
    assert_eq!(bench.history().last().unwrap().outcome, RunOutcome::Aborted);
    assert!(bench.sequencer().steps().all(StepState::Pending));
}

#[tokio::test(start_paused = true)]
async fn offline_start_is_refused() {
    let d = driver(100);
    d.bench().write().await.set_machine_status(MachineStatus::Offline);

    let err = assert_err!(d.start().await);
    assert_eq!(err, BenchError::MachineOffline);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let bench = d.bench().read().await;
    assert!(!bench.is_active());
    assert_eq!(bench.phase(), RunPhase::Idle);
    assert_eq!(bench.last_outcome(), None);
    assert!(bench.displayed_curve().is_empty());
    assert_eq!(bench.sample(1).unwrap().result_text(), "-");
    assert!(bench.notices().any(|n| n.message == "Machine is offline"));
}

#[tokio::test(start_paused = true)]
async fn open_door_blocks_start_until_closed() {
    let d = driver(10);
    d.bench().write().await.set_door_closed(false);
    assert_eq!(assert_err!(d.start().await), BenchError::InterlockOpen);

    d.bench().write().await.set_door_closed(true);
    assert_ok!(d.start().await);
    d.wait().await;
    assert_eq!(
        d.bench().read().await.last_outcome(),
        Some(RunOutcome::Completed)
    );
}

#[tokio::test]
async fn last_sample_cannot_be_deleted() {
    let d = driver(10);
    let mut bench = d.bench().write().await;
    assert_ok!(bench.remove_sample(1));
    assert_eq!(bench.selected_sample().unwrap().name, "A-102");

    let err = assert_err!(bench.remove_sample(2));
    assert_eq!(err, BenchError::LastSample);
    assert_eq!(bench.samples().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn rerun_overwrites_previous_result() {
    let d = driver(20);
    assert_ok!(d.start().await);
    d.wait().await;
    let first = d.bench().read().await.sample(1).unwrap().result;

    assert_ok!(d.start().await);
    d.wait().await;
    let bench = d.bench().read().await;
    let second = bench.sample(1).unwrap().result;
    assert!(first.is_some() && second.is_some());
    assert_eq!(second, Some(peak_stress(bench.displayed_curve())));
    assert_eq!(bench.history().len(), 2);
    assert!(bench.notices().any(|n| n.message.contains("overwritten")));
}

#[tokio::test(start_paused = true)]
async fn controls_refused_while_running() {
    let d = driver(100);
    assert_ok!(d.start().await);
    {
        let mut bench = d.bench().write().await;
        assert_eq!(assert_err!(bench.select_sample(2)), BenchError::RunInProgress);
        assert_eq!(assert_err!(bench.jog_crosshead(5.0)), BenchError::RunInProgress);
        assert_eq!(assert_err!(bench.zero_sensors()), BenchError::RunInProgress);
        assert_eq!(assert_err!(bench.remove_sample(1)), BenchError::RunInProgress);
        // Removing a sample that is not under test is allowed.
        assert_ok!(bench.remove_sample(2));
    }
    assert_ok!(d.stop().await);
    assert_eq!(assert_err!(d.stop().await), BenchError::NotRunning);
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_finish_the_same_run() {
    let d = driver(60);
    let started = assert_ok!(d.start().await);
    tokio::time::sleep(TICK * 20 + Duration::from_millis(10)).await;
    assert_ok!(d.pause().await);

    tokio::time::sleep(Duration::from_secs(30)).await;
    {
        let bench = d.bench().read().await;
        assert_eq!(bench.phase(), RunPhase::Paused);
        assert_eq!(bench.displayed_curve().len(), 20);
        assert_eq!(bench.sample(1).unwrap().result_text(), "-");
    }

    let resumed = assert_ok!(d.resume().await);
    assert_eq!(resumed.sample_id, started.sample_id);
    d.wait().await;

    let bench = d.bench().read().await;
    assert_eq!(bench.displayed_curve().len(), 60);
    assert_eq!(bench.history().len(), 1);
    let sample = bench.sample(1).unwrap();
    assert_eq!(sample.status, SampleStatus::Completed);
    assert_eq!(sample.result, Some(peak_stress(bench.displayed_curve())));
}

#[tokio::test(start_paused = true)]
async fn force_limit_ends_run_and_records_peak() {
    let config = BenchConfig {
        force_limit_n: 1950.0,
        ..BenchConfig::default()
    };
    let d = driver_with(&config, 100, Box::new(Noiseless));
    assert_ok!(d.start().await);
    d.wait().await;

    let bench = d.bench().read().await;
    assert_eq!(bench.last_outcome(), Some(RunOutcome::ForceLimit));
    assert_eq!(bench.phase(), RunPhase::Idle);
    // 1000 N per 1% strain on a 40 mm² section: index 19 is 1900 N, index 20 is 2000 N
    assert_eq!(bench.displayed_curve().len(), 20);
    let sample = bench.sample(1).unwrap();
    assert_eq!(sample.status, SampleStatus::Completed);
    assert_eq!(sample.result, Some(peak_stress(bench.displayed_curve())));
}
