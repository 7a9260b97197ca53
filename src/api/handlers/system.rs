//! `ping`, `getLicense`, the scanner bridge endpoints
//! `getScanStatus`/`startScan`, and `getPodcasts`.

use crate::db::podcast;
use crate::db::pool::SessionPool;
use crate::scanner::{Phase, ScannerService};

use super::super::context::RequestContext;
use super::super::error::ApiError;
use super::super::ids;
use super::super::response::{Node, Response};
use super::{ok, read_tx};

pub fn get_license(ctx: &RequestContext) -> Result<Response, ApiError> {
    let license = Node::new()
        .with_attr("valid", true)
        .with_attr("email", "")
        .with_attr("licenseExpires", "2099-12-31T00:00:00.000Z")
        .with_attr("trialExpires", "2099-12-31T00:00:00.000Z");
    Ok(ok(ctx).with_root(|root| root.with_child("license", license)))
}

fn phase_name(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "idle",
        Phase::Discovering => "discovering",
        Phase::ParsingAndUpserting => "parsing",
        Phase::ReconcilingOrphans => "reconciling",
        Phase::RecomputingArtwork => "recomputing_artwork",
        Phase::UpdatingStatistics => "updating_statistics",
        Phase::ReloadingSimilarityEngine => "reloading_similarity_engine",
    }
}

pub async fn get_scan_status(ctx: &RequestContext, scanner: &ScannerService) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    let status = scanner.status().await;
    let scan_status = Node::new()
        .with_attr("scanning", status.phase != Phase::Idle)
        .with_attr("phase", phase_name(status.phase))
        .with_attr("count", status.current_stats.files_scanned as i64)
        .with_opt_attr("lastScan", status.last_complete_scan.as_ref().map(|d| d.to_iso8601_string()));
    Ok(ok(ctx).with_root(|root| root.with_child("scanStatus", scan_status)))
}

/// `fullScan=true` maps to `requestImmediateScan(force: true)`: ignore
/// every track's stored last-write time and re-parse the whole library
/// on this pass.
pub fn start_scan(ctx: &RequestContext, scanner: &ScannerService) -> Result<Response, ApiError> {
    ctx.require_admin()?;
    let full_scan = ctx.parsed_param::<bool>("fullScan")?.unwrap_or(false);
    scanner.request_immediate_scan(full_scan);
    Ok(ok(ctx))
}

fn episode_state_name(state: crate::db::models::PodcastEpisodeState) -> &'static str {
    use crate::db::models::PodcastEpisodeState::*;
    match state {
        NotDownloaded => "skipped",
        Downloading => "downloading",
        Completed => "completed",
        Error => "error",
    }
}

/// Podcasts are ingested by an external fetcher this core never runs;
/// this only reports the episodes that fetcher has already dropped
/// rows for. Every channel-grouping field
/// OpenSubsonic exposes on `channel` is reported empty since nothing
/// here tracks feed URLs or channel metadata, only downloaded episodes.
pub async fn get_podcasts(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let (_session, mut tx) = read_tx(pool).await?;
    let episodes = podcast::find_all(&mut tx).await?;
    tx.finish().await?;

    let episode_nodes = episodes
        .into_iter()
        .map(|episode| {
            Node::new()
                .with_attr("id", ids::podcast_episode_id(episode.id))
                .with_attr("title", episode.title)
                .with_attr("status", episode_state_name(episode.state))
                .with_opt_attr("publishDate", episode.published_at.map(|d| d.to_iso8601_string()))
        })
        .collect();

    Ok(ok(ctx).with_root(|root| {
        root.with_child(
            "podcasts",
            Node::new().with_child("channel", Node::new().with_children("episode", episode_nodes)),
        )
    }))
}
