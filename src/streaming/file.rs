//! The file resource handler: streams an absolute path with
//! full HTTP Range support, via `tower_http`'s file service rather than
//! hand-rolled range parsing.

use std::path::Path;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Serves `path` for `request` (Range headers included), overriding the
/// `Content-Type` tower_http would otherwise guess from the extension,
/// and answering `404` if the file has disappeared since it was
/// indexed.
pub async fn serve(path: &Path, mime: &str, download_filename: Option<&str>, request: Request) -> HttpResponse {
    let service = ServeFile::new(path);
    let response = match service.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    if response.status() != StatusCode::OK && response.status() != StatusCode::PARTIAL_CONTENT {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut response = response.map(Body::new);
    if let Ok(value) = HeaderValue::from_str(mime) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    if let Some(name) = download_filename {
        let sanitized = name.replace(['\\', '"'], "_");
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{sanitized}\"")) {
            response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}
