//! The binary-endpoint error type: unlike the structured API these
//! responses use real HTTP status codes instead of a `status="failed"`
//! envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("bad parameter: {0}")]
    BadParameter(&'static str),
    #[error(transparent)]
    Db(#[from] crate::db::Error),
    #[error(transparent)]
    Transcode(#[from] super::transcode::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::MissingParameter(_) | Error::BadParameter(_) => StatusCode::BAD_REQUEST,
            Error::Db(crate::db::Error::ObjectNotFound) => StatusCode::NOT_FOUND,
            Error::Db(_) | Error::Transcode(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
