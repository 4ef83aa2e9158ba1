//! Web server implementation

use crate::static_files::StaticFiles;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Server configuration
#[derive(Debug, Clone)]
pub struct WebServerConfig {
    /// Listen address
    pub addr: SocketAddr,

    /// Directory overriding the embedded page assets
    pub static_dir: Option<PathBuf>,
}

impl WebServerConfig {
    /// Read configuration from `IMGREG_WEB_ADDR` and `IMGREG_WEB_STATIC_DIR`
    pub fn from_env() -> anyhow::Result<Self> {
        let addr = std::env::var("IMGREG_WEB_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let static_dir = std::env::var("IMGREG_WEB_STATIC_DIR")
            .ok()
            .and_then(|v| {
                let v = v.trim();
                if v.is_empty() { None } else { Some(PathBuf::from(v)) }
            });

        Ok(Self { addr, static_dir })
    }
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            static_dir: None,
        }
    }
}

/// Web server state
#[derive(Clone)]
pub struct WebServer {
    state: Arc<WebServerState>,
    addr: SocketAddr,
}

struct WebServerState {
    static_files: StaticFiles,
}

impl WebServer {
    /// Create a new web server
    pub fn new(cfg: WebServerConfig) -> Self {
        Self {
            state: Arc::new(WebServerState {
                static_files: StaticFiles::new(cfg.static_dir),
            }),
            addr: cfg.addr,
        }
    }

    /// Create router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(index_handler))
            .route("/index.html", get(index_handler))
            .route("/assets/*path", get(static_handler))
            .route("/api/health", get(health_handler))
            .fallback(not_found_handler)
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the web server
    pub async fn serve(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!("Image registration page at http://{}", listener.local_addr()?);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

impl Default for WebServer {
    fn default() -> Self {
        Self::new(WebServerConfig::default())
    }
}

/// Serve until the process exits
pub async fn serve(cfg: WebServerConfig) -> anyhow::Result<()> {
    WebServer::new(cfg).serve().await
}

// ============================================================================
// Handlers
// ============================================================================

async fn index_handler(State(state): State<Arc<WebServerState>>) -> Response {
    state.static_files.index().await
}

async fn static_handler(
    State(state): State<Arc<WebServerState>>,
    Path(path): Path<String>,
) -> Response {
    state.static_files.serve(&path).await
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "imgreg-web"
    }))
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not found" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    async fn get(uri: &str) -> Response {
        WebServer::default()
            .router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let res = get("/api/health").await;
        assert_eq!(res.status(), StatusCode::OK);

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "imgreg-web");
    }

    #[tokio::test]
    async fn test_root_serves_page() {
        let res = get("/").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "text/html");

        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("id=\"btnSubmit\""));
        assert!(html.contains("/assets/app.js"));
    }

    #[tokio::test]
    async fn test_assets_and_unknown_paths() {
        let res = get("/assets/app.js").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/javascript");

        let res = get("/assets/missing.js").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = get("/api/unknown").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
