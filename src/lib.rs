//! Core of a self-hosted music library server: scanner, catalog store,
//! Subsonic API surface and on-demand transcoding.

pub mod config;
pub mod ids;
pub mod primitives;

pub mod db;
pub mod metadata;
pub mod scanner;

pub mod api;
pub mod streaming;
