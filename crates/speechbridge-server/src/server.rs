//! Axum-based HTTP server.

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use speechbridge_pipeline::worker::live::shutdown_signal;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes;
use crate::state::AppState;

/// Upper bound for uploaded audio: about 13 minutes of 16 kHz mono 16-bit
/// PCM (32 kB/s). Uploads are split into `CHUNK_SECS` pieces before
/// recognition, so the vendor's per-request limit does not apply here.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;

/// Build the full application: API routes first, then the dashboard catch-all.
pub fn router(state: Arc<AppState>) -> Router {
    let audio_routes = Router::new()
        .route("/api/transcribe", post(routes::transcribe))
        .route("/api/pipeline", post(routes::pipeline))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES));

    let api = Router::new()
        .route("/health", get(routes::health))
        .route("/api/diagnostics", get(routes::diagnostics))
        .route("/api/languages", get(routes::languages))
        .route("/api/translate", post(routes::translate))
        .route("/api/synthesize", post(routes::synthesize))
        .route("/api/youtube", post(routes::youtube_pipeline))
        .route("/api/batch/transcribe", post(routes::batch_transcribe))
        .route("/api/batch/translate", post(routes::batch_translate))
        .route("/api/live/status", get(routes::live_status))
        .route("/api/live/start", post(routes::live_start))
        .route("/api/live/stop", post(routes::live_stop))
        .route("/api/live/transcripts", get(routes::live_transcripts))
        .merge(audio_routes)
        .with_state(state);

    api.merge(speechbridge_web::ui_router())
        .layer(TraceLayer::new_for_http())
}

/// Start the dashboard server and run until Ctrl-C or SIGTERM.
pub async fn start_server(state: Arc<AppState>, bind: &str, port: u16) -> anyhow::Result<()> {
    #[allow(unused_mut)]
    let mut app = router(state);

    #[cfg(feature = "metrics")]
    {
        let handle = crate::metrics::install_prometheus_recorder()?;
        app = app
            .route_layer(axum::middleware::from_fn(crate::metrics::track_requests))
            .route(
                "/metrics",
                get(move || {
                    let handle = handle.clone();
                    async move { handle.render() }
                }),
            );
        info!("Prometheus metrics at /metrics");
    }

    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Dashboard available at http://{addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
