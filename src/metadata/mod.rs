//! Pure metadata/image/lyrics probes. None of this module touches the
//! catalog store; it only turns bytes on disk into parsed values the
//! scanner then upserts.

pub mod audio;
pub mod error;
pub mod hash;
pub mod image;
pub mod lyrics;

pub use error::{Error, Result};
