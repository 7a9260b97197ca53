//! Store-level typed errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("object not found")]
    ObjectNotFound,
    #[error("unique constraint violated: {0}")]
    UniqueConstraintViolated(String),
    #[error("timed out waiting for a free session")]
    LockTimeout,
    #[error("schema version mismatch: database is at {found}, binary expects {expected}")]
    SchemaVersionMismatch { found: i64, expected: i64 },
    #[error("database corruption detected: {0}")]
    Corruption(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Error::ObjectNotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::UniqueConstraintViolated(db_err.message().to_string())
            }
            _ => Error::Sql(err),
        }
    }
}
