//! The Subsonic request layer: authentication, version negotiation,
//! dispatch to per-endpoint handlers, and the response tree those
//! handlers build.

pub mod auth;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod response;

pub use dispatch::{build_router, AppState};
