//! The scanner's externally-visible status and event contract:
//! `requestReload`/`requestImmediateScan`/`getStatus`/events.

use crate::primitives::PartialDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Discovering,
    ParsingAndUpserting,
    ReconcilingOrphans,
    RecomputingArtwork,
    UpdatingStatistics,
    ReloadingSimilarityEngine,
}

#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub files_discovered: u64,
    pub files_scanned: u64,
    pub files_skipped_unchanged: u64,
    pub files_with_errors: u64,
    pub tracks_added: u64,
    pub tracks_updated: u64,
    pub tracks_removed: u64,
    pub artists_removed: u64,
    pub releases_removed: u64,
    pub duplicate_mbid_skips: u64,
}

#[derive(Debug, Clone)]
pub struct Status {
    pub phase: Phase,
    pub last_complete_scan: Option<PartialDateTime>,
    pub current_stats: ScanStats,
    /// Progress is reported throttled: updated at most a few times a
    /// second even though files complete far faster.
    pub progress_fraction: f32,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            last_complete_scan: None,
            current_stats: ScanStats::default(),
            progress_fraction: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ScanEvent {
    Started,
    ProgressChanged { phase: Phase, progress_fraction: f32 },
    Completed { stats: ScanStats },
    Cancelled,
    Failed { reason: String },
}
