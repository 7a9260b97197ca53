//! The catalog store: a SQLite-backed, single-writer, many-reader
//! database of everything the scanner discovers and the Subsonic API
//! surface serves back out.

pub mod artist;
pub mod cluster;
pub mod directory;
pub mod error;
pub mod find;
pub mod image;
pub mod lyrics;
pub mod models;
pub mod podcast;
pub mod pool;
pub mod release;
pub mod scan_settings;
pub mod schema;
pub mod track;
pub mod tracklist;
pub mod user;

pub use error::{Error, Result};
pub use find::{FindParameters, SortMethod};
pub use pool::{Executor, ReadTransaction, Session, SessionPool, WriteCapable, WriteTransaction};
