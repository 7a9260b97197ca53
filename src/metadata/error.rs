//! Typed errors for the metadata/image/lyrics probes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} has no recognizable audio properties")]
    NoAudioProperties { path: String },
    #[error("unsupported or corrupt tag container in {path}: {reason}")]
    Tag { path: String, reason: String },
    #[error("unsupported image format: {0}")]
    UnsupportedImage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
