//! Dashboard — Axum web server for the operator console.
//!
//! Serves a REST API over the bench and a self-contained HTML page.
//! CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    response::Html,
    routing::{delete, get, post},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub use routes::{AppState, DashboardState};

/// The embedded dashboard HTML (compiled into the binary).
const DASHBOARD_HTML: &str = include_str!("templates/index.html");

/// Bind the dashboard port and serve in a background task.
///
/// Binding happens before spawning so a busy port is reported to the caller.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // Read-only views
        .route("/api/status", get(routes::get_status))
        .route("/api/curve", get(routes::get_curve))
        .route("/api/notices", get(routes::get_notices))
        .route("/api/runs", get(routes::get_runs))
        // Sample queue
        .route(
            "/api/samples",
            get(routes::get_samples).post(routes::add_sample),
        )
        .route("/api/samples.csv", get(routes::export_queue_csv))
        .route("/api/samples/:id", delete(routes::delete_sample))
        .route("/api/samples/:id/select", post(routes::select_sample))
        .route("/api/samples/:id/export", get(routes::export_sample))
        .route("/api/export", post(routes::export_all))
        // Bench controls
        .route("/api/run/start", post(routes::start_run))
        .route("/api/run/stop", post(routes::stop_run))
        .route("/api/run/pause", post(routes::pause_run))
        .route("/api/run/resume", post(routes::resume_run))
        .route("/api/machine", post(routes::set_machine))
        .route("/api/door", post(routes::set_door))
        .route("/api/crosshead/jog", post(routes::jog_crosshead))
        .route("/api/sensors/zero", post(routes::zero_sensors))
        .route("/health", get(routes::health))
        // Dashboard HTML
        .route("/", get(serve_dashboard))
        .layer(cors)
        .with_state(state)
}

/// Serve the embedded HTML dashboard.
async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BenchConfig;
    use crate::curve::{CurveParams, UniformNoise};
    use crate::engine::{RunDriver, TestBench};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let params = CurveParams {
            points: 10,
            ..CurveParams::default()
        };
        let bench = TestBench::with_noise(
            &BenchConfig::default(),
            params,
            Box::new(UniformNoise::seeded(5)),
        );
        let driver = RunDriver::new(Arc::new(RwLock::new(bench)), Duration::from_millis(50));
        let dir = std::env::temp_dir().join(format!("horizon_dash_{}", uuid::Uuid::new_v4()));
        Arc::new(DashboardState::new(driver, dir))
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state());
        let resp = app.oneshot(get_req("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let app = build_router(test_state());
        let resp = app.oneshot(get_req("/api/status")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["is_running"], false);
        assert_eq!(json["door_closed"], true);
        assert_eq!(json["steps"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_samples_endpoint() {
        let app = build_router(test_state());
        let resp = app.oneshot(get_req("/api/samples")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        let names: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["A-101", "A-102"]);
    }

    #[tokio::test]
    async fn test_add_sample_endpoint() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(post_json("/api/samples", r#"{"name":"B-7"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp).await;
        assert_eq!(json["name"], "B-7");
        assert_eq!(json["result"], "-");
    }

    #[tokio::test]
    async fn test_add_invalid_sample_is_unprocessable() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(post_json("/api/samples", r#"{"width":-1.0}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_delete_last_sample_conflicts() {
        let state = test_state();
        let app = build_router(state.clone());
        let del = |id: u32| {
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/samples/{id}"))
                .body(Body::empty())
                .unwrap()
        };

        let resp = app.clone().oneshot(del(2)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.clone().oneshot(del(1)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "Cannot remove the last remaining sample");

        let resp = app.oneshot(del(99)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.bench().read().await.samples().len(), 1);
    }

    #[tokio::test]
    async fn test_start_with_door_open_conflicts() {
        let state = test_state();
        let app = build_router(state.clone());
        let resp = app
            .clone()
            .oneshot(post_json("/api/door", r#"{"closed":false}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app.oneshot(post_json("/api/run/start", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert!(!state.driver.is_active().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_then_export() {
        let state = test_state();
        let app = build_router(state.clone());

        let resp = app
            .clone()
            .oneshot(post_json("/api/run/start", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        state.driver.wait().await;

        let resp = app.clone().oneshot(get_req("/api/curve")).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 10);

        let resp = app.oneshot(get_req("/api/samples/1/export")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let disposition = resp.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert_eq!(disposition, "attachment; filename=\"A-101.txt\"");

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let doc = String::from_utf8(body.to_vec()).unwrap();
        assert!(doc.starts_with("Method: ISO 527-2\nSample: A-101\nResult: "));
        assert!(doc.contains(" MPa\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume_endpoints() {
        let state = test_state();
        let app = build_router(state.clone());

        let resp = app.clone().oneshot(post_json("/api/run/resume", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "No paused test to resume");

        app.clone().oneshot(post_json("/api/run/start", "")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        let resp = app.clone().oneshot(post_json("/api/run/pause", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app.clone().oneshot(get_req("/api/status")).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["phase"], "Paused");
        assert_eq!(json["is_paused"], true);
        assert_eq!(json["cursor"], 2);

        let resp = app.clone().oneshot(post_json("/api/run/resume", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        state.driver.wait().await;

        let resp = app.oneshot(get_req("/api/status")).await.unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["phase"], "Idle");
        assert_eq!(json["last_outcome"], "Completed");
        assert_eq!(json["cursor"], 10);
    }

    #[tokio::test]
    async fn test_stop_when_idle_conflicts() {
        let app = build_router(test_state());
        let resp = app.oneshot(post_json("/api/run/stop", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_jog_endpoint() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(post_json("/api/crosshead/jog", r#"{"delta_mm":12.5}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["position_mm"].as_f64().unwrap(), 12.5);
    }

    #[tokio::test]
    async fn test_export_all_writes_files() {
        let state = test_state();
        let dir = state.export_dir.clone();
        let app = build_router(state);
        let resp = app.oneshot(post_json("/api/export", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["files"].as_array().unwrap().len(), 3);
        assert!(dir.join("A-101.txt").exists());
        assert!(dir.join("samples.csv").exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_samples_csv_endpoint() {
        let app = build_router(test_state());
        let resp = app.oneshot(get_req("/api/samples.csv")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let csv = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_dashboard_html() {
        let app = build_router(test_state());
        let resp = app.oneshot(get_req("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("HORIZON"));
        assert!(html.contains("Dashboard"));
    }
}
