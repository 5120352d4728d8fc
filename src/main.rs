//! HORIZON — simulated tensile-testing bench.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the bench and its run driver, then either serves the operator
//! dashboard until Ctrl+C or, with the dashboard disabled, runs the
//! selected sample once and exports the queue.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use horizon_utm::config::AppConfig;
use horizon_utm::dashboard::{self, DashboardState};
use horizon_utm::engine::{RunDriver, TestBench};
use horizon_utm::export::{self, SampleReport};

const BANNER: &str = r#"
 _   _  ___  ____  ___ __________  _   _
| | | |/ _ \|  _ \|_ _|__  / _ \| \ | |
| |_| | | | | |_) || |  / / | | |  \| |
|  _  | |_| |  _ < | | / /| |_| | |\  |
|_| |_|\___/|_| \_\___/____\___/|_| \_|

  Universal Testing Machine (simulated)
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    init_logging();

    let config_path = AppConfig::resolve_path();
    let cfg = AppConfig::load_or_default(&config_path)?;

    println!("{BANNER}");
    info!(
        config = %config_path,
        operator = %cfg.bench.operator,
        method = %cfg.bench.method,
        method_description = cfg.bench.method.description(),
        tick_interval_ms = cfg.run.tick_interval_ms,
        "HORIZON starting up"
    );

    // -- Bench and run driver --------------------------------------------

    let bench = TestBench::new(&cfg.bench, cfg.curve.clone());
    let driver = RunDriver::new(
        Arc::new(RwLock::new(bench)),
        Duration::from_millis(cfg.run.tick_interval_ms),
    );
    let state = Arc::new(DashboardState::new(driver, &cfg.export.dir));

    if cfg.dashboard.enabled {
        serve(&state, cfg.dashboard.port).await?;
    } else {
        run_once(&state).await?;
    }

    let bench = state.bench().read().await;
    info!(
        samples = bench.samples().len(),
        completed = bench.samples().iter().filter(|s| s.is_completed()).count(),
        runs = bench.history().len(),
        "HORIZON shut down cleanly."
    );

    Ok(())
}

/// Serve the dashboard until Ctrl+C, stopping any active run on the way out.
async fn serve(state: &Arc<DashboardState>, port: u16) -> Result<()> {
    let server = dashboard::spawn_dashboard(state.clone(), port).await?;

    info!(port, "Dashboard ready. Press Ctrl+C to stop.");
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received.");
        }
        _ = server => {
            error!("Dashboard server exited unexpectedly");
        }
    }

    if state.driver.is_active().await {
        if let Err(e) = state.driver.stop().await {
            warn!(error = %e, "Failed to stop active run");
        }
    }
    Ok(())
}

/// Headless mode: test the selected sample once, then export everything.
async fn run_once(state: &DashboardState) -> Result<()> {
    let ticket = state.driver.start().await.context("Failed to start test")?;
    info!(sample_id = ticket.sample_id, "Headless run started");

    tokio::select! {
        _ = state.driver.wait() => {}
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received, stopping run.");
            if let Err(e) = state.driver.stop().await {
                warn!(error = %e, "Failed to stop active run");
            }
        }
    }

    let bench = state.bench().read().await;
    if let Some(record) = bench.history().last() {
        if let Some(summary) = &record.summary {
            info!(
                sample = %record.sample_name,
                peak = format!("{:.2} MPa", summary.peak_stress),
                strain_at_peak = format!("{:.2}%", summary.strain_at_peak),
                modulus = ?summary.modulus_estimate,
                points = summary.points,
                "Run summary"
            );
        }
    }

    let now = chrono::Utc::now();
    for sample in bench.samples() {
        SampleReport::from_sample(sample, bench.operator(), now).write_to(&state.export_dir)?;
    }
    export::write_queue_csv(bench.samples(), &state.export_dir.join("samples.csv"))?;
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("horizon_utm=info"));

    let json_logging = std::env::var("HORIZON_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
