//! Static file serving
//!
//! The page, script, and stylesheet are embedded at build time and rendered
//! once with the messages, colors, and storage key of the form contract, so
//! the browser page and the simulated page cannot drift apart. A directory on
//! disk can override them during development.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use imgreg_common::{Indicator, STORAGE_KEY, TITLE_FEEDBACK, URL_FEEDBACK};
use mime_guess::{mime, Mime};
use once_cell::sync::Lazy;
use std::path::PathBuf;
use tracing::debug;

const INDEX_TEMPLATE: &str = include_str!("../static/index.html");
const APP_JS_TEMPLATE: &str = include_str!("../static/app.js");
const APP_CSS_TEMPLATE: &str = include_str!("../static/app.css");

static INDEX_HTML: Lazy<String> = Lazy::new(|| render(INDEX_TEMPLATE));
static APP_JS: Lazy<String> = Lazy::new(|| render(APP_JS_TEMPLATE));
static APP_CSS: Lazy<String> = Lazy::new(|| render(APP_CSS_TEMPLATE));

/// Substitute contract constants into an asset template
pub fn render(template: &str) -> String {
    template
        .replace("{{TITLE_FEEDBACK}}", TITLE_FEEDBACK)
        .replace("{{URL_FEEDBACK}}", URL_FEEDBACK)
        .replace("{{STORAGE_KEY}}", STORAGE_KEY)
        .replace("{{COLOR_NEUTRAL}}", Indicator::Neutral.border_color())
        .replace("{{COLOR_SUCCESS}}", Indicator::Success.border_color())
        .replace("{{COLOR_ERROR}}", Indicator::Error.border_color())
}

/// Static file handler
#[derive(Debug, Clone, Default)]
pub struct StaticFiles {
    /// Optional directory whose files take precedence over embedded assets
    dir: Option<PathBuf>,
}

impl StaticFiles {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// The registration page
    pub async fn index(&self) -> Response {
        self.serve("index.html").await
    }

    /// Serve a static file by relative path
    pub async fn serve(&self, path: &str) -> Response {
        let rel = path.trim_start_matches('/');
        let content_type = mime_guess::from_path(rel).first_or_octet_stream();

        if let Some(response) = self.serve_from_dir(rel, &content_type).await {
            return response;
        }

        match rel {
            "index.html" => serve_embedded(INDEX_HTML.as_str(), &content_type),
            "app.js" => serve_embedded(APP_JS.as_str(), &content_type),
            "app.css" => serve_embedded(APP_CSS.as_str(), &content_type),
            _ => (StatusCode::NOT_FOUND, "File not found").into_response(),
        }
    }

    async fn serve_from_dir(&self, rel: &str, content_type: &Mime) -> Option<Response> {
        let dir = self.dir.as_ref()?;

        // Keep the requested path inside dir.
        let canon_dir = dir.canonicalize().ok()?;
        let canon_req = dir.join(rel).canonicalize().ok()?;
        if !canon_req.starts_with(&canon_dir) {
            return Some((StatusCode::FORBIDDEN, "Forbidden").into_response());
        }

        let bytes = tokio::fs::read(&canon_req).await.ok()?;
        debug!("Serving {} from {}", rel, dir.display());

        // Text assets may carry the same placeholders as the embedded ones
        let is_text = content_type.type_() == mime::TEXT
            || content_type.subtype() == mime::JAVASCRIPT;
        let body = if is_text {
            render(&String::from_utf8_lossy(&bytes)).into_bytes()
        } else {
            bytes
        };

        Some((StatusCode::OK, [(header::CONTENT_TYPE, content_type.as_ref())], body).into_response())
    }
}

fn serve_embedded(content: &'static str, content_type: &Mime) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type.as_ref())],
        content,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assets_have_no_placeholders_left() {
        for asset in [&*INDEX_HTML, &*APP_JS, &*APP_CSS] {
            assert!(!asset.contains("{{"), "unrendered placeholder in asset");
        }
    }

    #[test]
    fn test_page_exposes_form_ids_and_messages() {
        for id in [
            "id=\"title\"",
            "id=\"titleFeedback\"",
            "id=\"imageUrl\"",
            "id=\"urlFeedback\"",
            "id=\"btnSubmit\"",
            "id=\"card-list\"",
        ] {
            assert!(INDEX_HTML.contains(id), "missing {}", id);
        }
        assert!(INDEX_HTML.contains(TITLE_FEEDBACK));
        assert!(INDEX_HTML.contains(URL_FEEDBACK));
        assert!(APP_CSS.contains("rgb(220, 53, 69)"));
        assert!(APP_CSS.contains("rgb(134, 183, 254)"));
        assert!(APP_JS.contains("const STORAGE_KEY = 'images'"));
    }

    #[tokio::test]
    async fn test_dir_overrides_embedded_and_blocks_traversal() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("site");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("app.css"), "b { color: {{COLOR_ERROR}}; }").unwrap();
        std::fs::write(root.path().join("secret.txt"), "nope").unwrap();

        let files = StaticFiles::new(Some(dir));

        let res = files.serve("app.css").await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"b { color: rgb(220, 53, 69); }");

        let res = files.serve("../secret.txt").await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        // Not on disk: falls back to the embedded copy
        let res = files.serve("app.js").await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_content_types_follow_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        std::fs::write(dir.path().join("notes.xyz"), "x").unwrap();
        let files = StaticFiles::new(Some(dir.path().to_path_buf()));

        let content_type = |res: &Response| {
            res.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string()
        };

        let res = files.serve("logo.png").await;
        assert_eq!(content_type(&res), "image/png");
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], &[0x89, b'P', b'N', b'G']);

        let res = files.serve("notes.xyz").await;
        assert_eq!(content_type(&res), "application/octet-stream");

        assert!(content_type(&files.index().await).starts_with("text/html"));
        assert!(content_type(&files.serve("app.css").await).starts_with("text/css"));
        assert!(content_type(&files.serve("app.js").await).contains("javascript"));
    }
}
