//! The background scanner service: owns the scan loop, reports status
//! and broadcasts events to subscribers such as the API layer's
//! `getScanStatus`/`startScan` handlers.

mod discover;
mod pipeline;
mod status;

pub use pipeline::PipelineConfig;
pub use status::{Phase, ScanEvent, ScanStats, Status};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tracing::{error, info};

use crate::db::pool::SessionPool;
use crate::db::scan_settings;
use crate::ids::MediaLibraryId;
use crate::primitives::PartialDateTime;

/// A media library root the scanner walks on each pass.
#[derive(Debug, Clone)]
pub struct LibraryRoot {
    pub id: MediaLibraryId,
    pub path: std::path::PathBuf,
}

/// Handle shared by every caller that wants to trigger or observe scans.
/// One background task owns the actual run loop; this struct only holds
/// the channels used to talk to it.
#[derive(Clone)]
pub struct ScannerService {
    status: Arc<Mutex<Status>>,
    events: broadcast::Sender<ScanEvent>,
    trigger: watch::Sender<u64>,
    cancel: Arc<AtomicBool>,
    force: Arc<AtomicBool>,
}

impl ScannerService {
    /// Spawns the background scan loop and returns a handle to it. The
    /// loop waits on `trigger` and runs one pass over every configured
    /// library each time it fires, including once immediately at
    /// startup.
    pub fn spawn(pool: SessionPool, config: PipelineConfig, libraries: Vec<LibraryRoot>) -> Self {
        let status = Arc::new(Mutex::new(Status::default()));
        let (events, _) = broadcast::channel(64);
        let (trigger, mut trigger_rx) = watch::channel(0u64);
        let cancel = Arc::new(AtomicBool::new(false));
        let force = Arc::new(AtomicBool::new(false));

        let service = Self {
            status: status.clone(),
            events: events.clone(),
            trigger: trigger.clone(),
            cancel: cancel.clone(),
            force: force.clone(),
        };

        tokio::spawn(async move {
            // Run once at startup, then whenever `trigger` changes.
            loop {
                run_all_libraries(&pool, &config, &libraries, &status, &events, &cancel, &force).await;
                if trigger_rx.changed().await.is_err() {
                    break;
                }
            }
        });

        service
    }

    /// Requests a fresh scan of every configured library. If a scan is
    /// already running, it finishes its current file before the next
    /// pass begins (the run loop doesn't interrupt work in progress
    /// just because another request arrived). `force` bumps the
    /// persisted scan version so the next pass re-parses every file
    /// regardless of its stored last-write time, instead of skipping
    /// anything unchanged since the previous pass.
    pub fn request_immediate_scan(&self, force: bool) {
        if force {
            self.force.store(true, Ordering::Relaxed);
        }
        let _ = self.trigger.send(self.trigger.borrow().wrapping_add(1));
    }

    /// Same trigger as `request_immediate_scan(false)`; kept as a
    /// distinct name since a config/library-list reload and an
    /// operator-invoked rescan are different call sites even though
    /// the effect today is identical (both just wake the run loop for
    /// the next pass, which re-reads `ScanSettings` for itself).
    pub fn request_reload(&self) {
        self.request_immediate_scan(false);
    }

    /// Requests the current pass stop as soon as it reaches its next
    /// cancellation check point, rather than waiting for it to finish
    /// every discovered file.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub async fn status(&self) -> Status {
        self.status.lock().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }
}

async fn run_all_libraries(
    pool: &SessionPool,
    config: &PipelineConfig,
    libraries: &[LibraryRoot],
    status: &Arc<Mutex<Status>>,
    events: &broadcast::Sender<ScanEvent>,
    cancel: &Arc<AtomicBool>,
    force: &Arc<AtomicBool>,
) {
    if libraries.is_empty() {
        return;
    }

    let forced = force.swap(false, Ordering::Relaxed);
    let scan_version = match resolve_scan_version(pool, forced).await {
        Ok(version) => version,
        Err(e) => {
            error!(error = %e, "failed to read scan settings, skipping pass");
            return;
        }
    };

    cancel.store(false, Ordering::Relaxed);
    let _ = events.send(ScanEvent::Started);
    {
        let mut status = status.lock().await;
        status.phase = Phase::Discovering;
        status.progress_fraction = 0.0;
    }

    let mut combined = ScanStats::default();
    let mut failed = false;
    for library in libraries {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let status = status.clone();
        let events = events.clone();
        let result = pipeline::run(
            pool,
            config,
            library.id,
            &library.path,
            scan_version,
            cancel.clone(),
            move |fraction| {
                let status = status.clone();
                let events = events.clone();
                tokio::spawn(async move {
                    let phase = phase_for_progress(fraction);
                    let mut status = status.lock().await;
                    status.phase = phase;
                    status.progress_fraction = fraction;
                    let _ = events.send(ScanEvent::ProgressChanged {
                        phase,
                        progress_fraction: fraction,
                    });
                });
            },
        )
        .await;

        match result {
            Ok(stats) => {
                combined.files_discovered += stats.files_discovered;
                combined.files_scanned += stats.files_scanned;
                combined.files_skipped_unchanged += stats.files_skipped_unchanged;
                combined.files_with_errors += stats.files_with_errors;
                combined.tracks_added += stats.tracks_added;
                combined.tracks_updated += stats.tracks_updated;
                combined.tracks_removed += stats.tracks_removed;
                combined.artists_removed += stats.artists_removed;
                combined.releases_removed += stats.releases_removed;
                combined.duplicate_mbid_skips += stats.duplicate_mbid_skips;
            }
            Err(e) => {
                error!(library = %library.path.display(), error = %e, "scan of library failed");
                failed = true;
            }
        }
    }

    let mut status = status.lock().await;
    if failed {
        status.phase = Phase::Idle;
        let _ = events.send(ScanEvent::Failed {
            reason: "one or more libraries failed to scan".into(),
        });
    } else if cancel.load(Ordering::Relaxed) {
        status.phase = Phase::Idle;
        let _ = events.send(ScanEvent::Cancelled);
    } else {
        status.phase = Phase::Idle;
        status.last_complete_scan = Some(PartialDateTime::from_str(&chrono::Utc::now().to_rfc3339()));
        let _ = events.send(ScanEvent::Completed { stats: combined.clone() });
        info!(
            tracks_added = combined.tracks_added,
            tracks_updated = combined.tracks_updated,
            tracks_removed = combined.tracks_removed,
            "scan complete"
        );
    }
    status.current_stats = combined;
    status.progress_fraction = 1.0;
}

/// Reads the persisted scan version, bumping it first when `forced` —
/// `requestImmediateScan(force: true)`'s contract is "ignore
/// last-write-time caching, re-parse everything", which the pipeline
/// achieves by comparing each track's stored `scan_version` against
/// the one passed in for this pass.
async fn resolve_scan_version(pool: &SessionPool, forced: bool) -> crate::db::Result<i64> {
    if forced {
        let session = pool.session().await?;
        let mut tx = session.write().await?;
        let settings = scan_settings::find(&mut tx).await?;
        scan_settings::update(
            &mut tx,
            &settings.media_directories,
            &settings.audio_extensions,
            settings.update_period.as_deref(),
            true,
        )
        .await?;
        let bumped = scan_settings::find(&mut tx).await?.scan_version;
        tx.commit().await?;
        Ok(bumped)
    } else {
        let session = pool.session().await?;
        let mut tx = session.read().await?;
        let version = scan_settings::find(&mut tx).await?.scan_version;
        tx.finish().await?;
        Ok(version)
    }
}

fn phase_for_progress(fraction: f32) -> Phase {
    match fraction {
        f if f < 0.7 => Phase::ParsingAndUpserting,
        f if f < 0.8 => Phase::ReconcilingOrphans,
        f if f < 0.9 => Phase::RecomputingArtwork,
        f if f < 1.0 => Phase::UpdatingStatistics,
        _ => Phase::ReloadingSimilarityEngine,
    }
}
