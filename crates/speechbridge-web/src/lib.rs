//! Dashboard: embedded static assets served by the SpeechBridge server.
//!
//! `rust-embed` bakes the `ui/` directory into the binary, debug builds
//! included (`debug-embed`), so the server never depends on the working
//! directory.

use axum::{
    Router,
    extract::Path,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use rust_embed::Embed;
use tracing::debug;

#[derive(Embed)]
#[folder = "ui/"]
struct UiAssets;

/// Router serving the dashboard at `/` and its assets under the catch-all.
///
/// Merge this **after** the API routes so `/api/*` and `/health` win.
pub fn ui_router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/{*path}", get(static_handler))
}

async fn index_handler() -> Response {
    serve_file("index.html")
}

async fn static_handler(Path(path): Path<String>) -> Response {
    // Unknown API paths get a plain 404 instead of the page
    if path.starts_with("api/") {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }
    serve_file(&path)
}

fn serve_file(path: &str) -> Response {
    match UiAssets::get(path) {
        Some(asset) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                asset.data.into_owned(),
            )
                .into_response()
        }
        None => {
            debug!(path, "Asset not found");
            (StatusCode::NOT_FOUND, Html("<h1>404</h1>")).into_response()
        }
    }
}

/// Names of all embedded assets.
pub fn asset_names() -> Vec<String> {
    UiAssets::iter().map(|name| name.into_owned()).collect()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    async fn get_status(uri: &str) -> (StatusCode, String) {
        let response = ui_router()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (response.status(), content_type)
    }

    #[test]
    fn test_assets_are_embedded() {
        let names = asset_names();
        for expected in ["index.html", "app.js", "style.css"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_index_has_every_panel() {
        let index = UiAssets::get("index.html").unwrap();
        let html = std::str::from_utf8(&index.data).unwrap();
        for panel in ["live", "text", "file", "youtube", "batch", "diagnostics"] {
            assert!(
                html.contains(&format!(r#"<section id="{panel}""#)),
                "missing panel {panel}"
            );
        }
    }

    #[tokio::test]
    async fn test_index_and_assets() {
        let (status, ct) = get_status("/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ct.starts_with("text/html"));

        let (status, ct) = get_status("/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert!(ct.contains("javascript"));

        let (status, _) = get_status("/nope.png").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get_status("/api/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
