//! Static file serving
//!
//! Serves files from a root directory with a fixed extension-to-MIME table.
//! `/` maps to `index.html`, preflight `OPTIONS` gets an empty 204, missing
//! files are 404 and any other read failure is 500. Every response carries
//! permissive CORS headers; successful ones also disable caching.

use axum::{
    body::Body,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::path::{Component, Path, PathBuf};
use tower_http::set_header::SetResponseHeaderLayer;

pub const CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

/// Content type for a file path, by extension
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("glb") => "model/gltf-binary",
        Some("gltf") => "model/gltf+json",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
}

/// Map a request path to a path relative to the root. `None` if it would escape the root.
pub fn resolve(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    let mut relative = PathBuf::new();

    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if relative.as_os_str().is_empty() || request_path.ends_with('/') {
        relative.push("index.html");
    }

    Some(relative)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 - File not found").into_response()
}

/// Serve one request against `root`
pub async fn serve(root: &Path, method: &Method, uri: &Uri) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    let Some(relative) = resolve(uri.path()) else {
        tracing::debug!("Rejected path outside root: {}", uri.path());
        return not_found();
    };

    let path = root.join(&relative);
    match tokio::fs::read(&path).await {
        Ok(content) => {
            let body = if method == Method::HEAD {
                Body::empty()
            } else {
                Body::from(content)
            };
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type(&relative)),
                    (header::CACHE_CONTROL, CACHE_CONTROL),
                ],
                body,
            )
                .into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => not_found(),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("500 - Server error: {}", e.kind()),
            )
                .into_response()
        }
    }
}

/// Router that answers every unmatched request from `root`
pub fn router<S>(root: PathBuf, cors_enabled: bool) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let router = Router::new().fallback(move |method: Method, uri: Uri| {
        let root = root.clone();
        async move { serve(&root, &method, &uri).await }
    });

    if !cors_enabled {
        return router;
    }

    router
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
}
