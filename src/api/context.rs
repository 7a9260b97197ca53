//! Per-request state: the authenticated caller, negotiated protocol
//! version/format, and the response-rendering scratch arena.
//!
//! A real per-thread arena isn't expressible across an async request
//! (the task can hop executor threads between polls), so this reuses a
//! single `bumpalo::Bump` per request instead: reset once up front,
//! used only to grow the final XML/JSON buffer, then thrown away when
//! the request's `Arena` is dropped.

use std::cell::RefCell;
use std::collections::HashMap;

use bumpalo::collections::String as BumpString;
use bumpalo::Bump;

use crate::config::Config;
use crate::db::models::{User, UserType};

pub struct Arena {
    bump: RefCell<Bump>,
}

impl Arena {
    pub fn new() -> Self {
        Self { bump: RefCell::new(Bump::new()) }
    }

    /// Resets the arena, hands the closure a growable buffer allocated
    /// from it, and copies the finished buffer out as an owned
    /// `String` once the closure returns.
    pub fn with_scratch_buffer(&self, f: impl FnOnce(&mut BumpString)) -> String {
        let mut bump = self.bump.borrow_mut();
        bump.reset();
        let mut buf = BumpString::new_in(&bump);
        f(&mut buf);
        buf.as_str().to_string()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

// An `Arena` lives inside one `RequestContext`, owned by a single
// in-flight request's task and only ever borrowed synchronously
// within `with_scratch_buffer` (no borrow is held across an await
// point). It is therefore safe to mark `Sync` so that holding `&Arena`
// (transitively, `&RequestContext`) across an `.await` doesn't block
// the task's future from being `Send`.
unsafe impl Sync for Arena {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Xml,
    Json,
}

/// The caller's negotiated Subsonic protocol version (`v` parameter),
/// used for both version-gating and echoed back in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next().unwrap_or("0").parse().ok()?;
        Some(Self { major, minor, patch })
    }

    pub fn to_string(self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Minimum protocol version this server implements; callers below it
/// are rejected with the "client must upgrade" error.
pub const MIN_SUPPORTED_VERSION: ProtocolVersion = ProtocolVersion::new(1, 16, 0);
/// Version this server reports as its own, ceiling for version
/// negotiation against a client's requested `v`.
pub const SERVER_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(1, 16, 0);
pub const SERVER_VERSION: &str = "v3.72.0";

pub struct RequestContext {
    pub params: HashMap<String, String>,
    pub user: User,
    pub client_name: String,
    pub protocol_version: ProtocolVersion,
    pub format: ResponseFormat,
    pub open_subsonic_enabled: bool,
    pub arena: Arena,
}

impl RequestContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params_multi(&self, name: &str) -> Vec<String> {
        // Query extraction joins repeated keys with `\u{1}` (see
        // dispatch::collect_params) since axum's Query<HashMap<..>>
        // only keeps the last occurrence of a repeated key.
        self.param(name)
            .map(|joined| joined.split('\u{1}').map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn is_admin(&self) -> bool {
        self.user.user_type == UserType::Admin
    }

    pub fn require_admin(&self) -> Result<(), super::error::ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(super::error::ApiError::UserNotAuthorized)
        }
    }

    pub fn required_param(&self, name: &str) -> Result<&str, super::error::ApiError> {
        self.param(name).ok_or_else(|| super::error::ApiError::RequiredParameterMissing(name.to_string()))
    }

    pub fn parsed_param<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, super::error::ApiError> {
        match self.param(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| super::error::ApiError::generic_bad_parameter(name)),
        }
    }

    pub fn required_parsed_param<T: std::str::FromStr>(&self, name: &str) -> Result<T, super::error::ApiError> {
        self.parsed_param(name)?
            .ok_or_else(|| super::error::ApiError::RequiredParameterMissing(name.to_string()))
    }
}

/// Server-level policy bundled with the per-request config lookups
/// handlers need (old-protocol client list, OpenSubsonic opt-outs).
pub fn open_subsonic_enabled_for(config: &Config, client_name: &str, protocol_version: ProtocolVersion) -> bool {
    if config.reports_old_protocol_to(client_name) {
        return false;
    }
    if protocol_version < ProtocolVersion::new(1, 15, 0) {
        return false;
    }
    config.open_subsonic_enabled_for(client_name)
}
