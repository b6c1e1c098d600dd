//! Static file serving.
//!
//! Requests are looked up in each base directory in order; the first hit is
//! served. Directory requests serve their `index.html`. HTML pages get the
//! live-reload script injected when live reload is enabled.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use mime_guess::mime;
use percent_encoding::percent_decode_str;

use crate::state::AppState;

/// File served for directory requests.
const INDEX_FILE: &str = "index.html";

/// Create router for static file serving.
pub(crate) fn static_router() -> Router<Arc<AppState>> {
    Router::new().fallback(serve_file)
}

/// Serve a file from the first base directory that has it.
async fn serve_file(State(state): State<Arc<AppState>>, uri: Uri) -> Response {
    let Some(relative) = request_path(uri.path()) else {
        tracing::debug!(path = uri.path(), "Rejected request path");
        return StatusCode::NOT_FOUND.into_response();
    };

    for base in &state.base_dirs {
        let Some(file) = resolve(base, &relative).await else {
            continue;
        };
        return match tokio::fs::read(&file).await {
            Ok(content) => file_response(&state, &file, content),
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Failed to read file");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    }

    StatusCode::NOT_FOUND.into_response()
}

/// Decode a request path into a relative filesystem path.
///
/// Returns `None` for paths that are not valid UTF-8 after decoding or that
/// try to leave the base directory.
fn request_path(path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let mut relative = PathBuf::new();

    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') || s.contains('\0') => return None,
            s => relative.push(s),
        }
    }

    // A segment such as "C:" would turn the path absolute on Windows
    relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(relative)
}

/// Find the file to serve for `relative` under `base`.
async fn resolve(base: &Path, relative: &Path) -> Option<PathBuf> {
    let candidate = base.join(relative);
    let metadata = tokio::fs::metadata(&candidate).await.ok()?;

    if metadata.is_file() {
        return Some(candidate);
    }
    if metadata.is_dir() {
        let index = candidate.join(INDEX_FILE);
        if tokio::fs::metadata(&index).await.is_ok_and(|m| m.is_file()) {
            return Some(index);
        }
    }
    None
}

fn file_response(state: &AppState, path: &Path, content: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let content_type = if mime.type_() == mime::TEXT {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_owned()
    };

    let body = if state.live_reload_enabled() && mime == mime::TEXT_HTML {
        match String::from_utf8(content) {
            Ok(html) => state.snippet.inject(&html).into_owned().into_bytes(),
            Err(e) => e.into_bytes(),
        }
    } else {
        content
    };

    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_request_path_plain() {
        assert_eq!(request_path("/"), Some(PathBuf::new()));
        assert_eq!(request_path("/index.html"), Some(PathBuf::from("index.html")));
        assert_eq!(
            request_path("/public/img/logo.png"),
            Some(PathBuf::from("public/img/logo.png"))
        );
    }

    #[test]
    fn test_request_path_percent_decoded() {
        assert_eq!(
            request_path("/my%20page.html"),
            Some(PathBuf::from("my page.html"))
        );
    }

    #[test]
    fn test_request_path_rejects_traversal() {
        assert_eq!(request_path("/../secret"), None);
        assert_eq!(request_path("/public/%2e%2e/%2e%2e/etc/passwd"), None);
        assert_eq!(request_path("/public/..%5csecret"), None);
    }

    #[test]
    fn test_request_path_rejects_invalid_utf8() {
        assert_eq!(request_path("/%ff.html"), None);
    }

    #[tokio::test]
    async fn test_resolve_prefers_file_then_directory_index() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp.path().join("docs")).unwrap();
        std::fs::write(temp.path().join("docs/index.html"), "docs").unwrap();
        std::fs::write(temp.path().join("app.js"), "app").unwrap();
        std::fs::create_dir(temp.path().join("empty")).unwrap();

        assert_eq!(
            resolve(temp.path(), Path::new("app.js")).await,
            Some(temp.path().join("app.js"))
        );
        assert_eq!(
            resolve(temp.path(), Path::new("docs")).await,
            Some(temp.path().join("docs/index.html"))
        );
        assert_eq!(resolve(temp.path(), Path::new("empty")).await, None);
        assert_eq!(resolve(temp.path(), Path::new("missing.js")).await, None);
    }
}
