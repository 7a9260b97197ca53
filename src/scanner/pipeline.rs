//! The six-step scan sequence: discover files, parse and upsert
//! tracks, reconcile orphans, recompute preferred artwork, update
//! statistics and reload the similarity engine.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::Row;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::db::models::{Advisory, ArtistLinkRole, EmbeddedImageType};
use crate::db::pool::{Executor as _, SessionPool};
use crate::db::track::ParsedTrack;
use crate::db::{artist, cluster, directory, image as image_db, lyrics as lyrics_db, release, track};
use crate::ids::{MediaLibraryId, TrackId};
use crate::metadata::{audio, hash, image as image_probe, lyrics as lyrics_parser};
use crate::primitives::PartialDateTime;

use super::discover;
use super::status::ScanStats;

pub struct PipelineConfig {
    pub audio_extensions: Vec<String>,
    pub exclude_sentinel: String,
    pub worker_count: usize,
}

/// Runs every step against one media library root. `cancel` is polled
/// between files and between steps so a reload request or shutdown can
/// interrupt a long scan promptly.
pub async fn run(
    pool: &SessionPool,
    config: &PipelineConfig,
    library_id: MediaLibraryId,
    root_path: &Path,
    scan_version: i64,
    cancel: Arc<AtomicBool>,
    mut on_progress: impl FnMut(f32) + Send,
) -> crate::db::Result<ScanStats> {
    let stats = Arc::new(Mutex::new(ScanStats::default()));

    let is_first_scan = {
        let session = pool.session().await?;
        let mut tx = session.read().await?;
        let library = directory::find_library_by_id(&mut tx, library_id).await?;
        tx.finish().await?;
        library.first_scan
    };

    // Step 1: discover.
    let (files, directories) = discover::walk(root_path, &config.audio_extensions, &config.exclude_sentinel);
    stats.lock().await.files_discovered = files.len() as u64;
    let discovered_paths: HashSet<String> = files
        .iter()
        .map(|f| f.path.to_string_lossy().to_string())
        .collect();

    {
        let session = pool.session().await?;
        let mut tx = session.write().await?;
        for dir in &directories {
            let path_str = dir.to_string_lossy().to_string();
            let parent = dir
                .parent()
                .filter(|p| p.starts_with(root_path))
                .map(|p| p.to_string_lossy().to_string());
            let parent_id = match parent {
                Some(p) => directory::find_by_path(&mut tx, &p).await?.map(|d| d.id),
                None => None,
            };
            directory::find_or_create(&mut tx, &path_str, parent_id, library_id).await?;
        }
        tx.commit().await?;
    }

    // Step 2: parse and upsert, fanned out across a worker pool.
    let mut handles = Vec::new();
    let semaphore = Arc::new(tokio::sync::Semaphore::new(config.worker_count.max(1)));
    for file in files {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let pool = pool.clone();
        let stats = stats.clone();
        let semaphore = semaphore.clone();
        let permit = semaphore.acquire_owned().await.expect("semaphore open");
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            let result = parse_and_upsert_one(&pool, library_id, &file.path, scan_version, is_first_scan).await;
            let mut stats = stats.lock().await;
            match result {
                Ok(Outcome::Added) => {
                    stats.files_scanned += 1;
                    stats.tracks_added += 1;
                }
                Ok(Outcome::Updated) => {
                    stats.files_scanned += 1;
                    stats.tracks_updated += 1;
                }
                Ok(Outcome::SkippedUnchanged) => stats.files_skipped_unchanged += 1,
                Ok(Outcome::SkippedDuplicateMbid) => stats.duplicate_mbid_skips += 1,
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "failed to scan file");
                    stats.files_with_errors += 1;
                }
            }
        }));
    }
    let handle_count = handles.len().max(1);
    for (done, handle) in handles.into_iter().enumerate() {
        let _ = handle.await;
        on_progress((done + 1) as f32 / handle_count as f32 * 0.7);
    }

    if cancel.load(Ordering::Relaxed) {
        return Ok(stats.lock().await.clone());
    }

    // Step 3: reconcile orphans.
    {
        let session = pool.session().await?;
        let mut tx = session.write().await?;
        let mut guard = stats.lock().await;
        reconcile_orphans(&mut tx, library_id, &discovered_paths, &mut guard).await?;
        tx.commit().await?;
    }
    on_progress(0.8);

    // Step 4: recompute preferred artwork.
    {
        let session = pool.session().await?;
        let mut tx = session.write().await?;
        recompute_preferred_artwork(&mut tx).await?;
        tx.commit().await?;
    }
    on_progress(0.9);

    if is_first_scan {
        let session = pool.session().await?;
        let mut tx = session.write().await?;
        directory::mark_first_scan_done(&mut tx, library_id).await?;
        tx.commit().await?;
    }

    // Step 5 (statistics) is folded into the stats struct already
    // accumulated above; nothing further to compute against the store.

    // Step 6: reload the similarity engine. Out of scope for this
    // core (no recommendation subsystem is implemented), but the scan
    // still reaches this step so callers relying on `getStatus`
    // transitioning through every phase keep working.
    on_progress(1.0);

    let final_stats = stats.lock().await.clone();
    Ok(final_stats)
}

enum Outcome {
    Added,
    Updated,
    SkippedUnchanged,
    SkippedDuplicateMbid,
}

async fn parse_and_upsert_one(
    pool: &SessionPool,
    library_id: MediaLibraryId,
    path: &Path,
    scan_version: i64,
    is_first_scan: bool,
) -> crate::db::Result<Outcome> {
    let path_str = path.to_string_lossy().to_string();
    let metadata = std::fs::metadata(path).map_err(|e| crate::db::Error::Corruption(e.to_string()))?;
    let file_size = metadata.len();
    let last_write_time: PartialDateTime = system_time_to_partial(
        metadata.modified().map_err(|e| crate::db::Error::Corruption(e.to_string()))?,
    );

    let session = pool.session().await?;

    // Step 2a: skip unchanged.
    {
        let mut tx = session.read().await?;
        let existing = track::find_by_path(&mut tx, &path_str).await?;
        let unchanged = existing
            .as_ref()
            .map(|t| {
                t.file_size == file_size && t.last_write_time == last_write_time && t.scan_version == scan_version
            })
            .unwrap_or(false);
        tx.finish().await?;
        if unchanged {
            return Ok(Outcome::SkippedUnchanged);
        }
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let Some(reader) = audio::reader_for_extension(extension) else {
        return Err(crate::db::Error::Corruption(format!("no tag reader for .{extension}")));
    };
    let tags = reader
        .read_tags(path)
        .map_err(|e| crate::db::Error::Corruption(e.to_string()))?;
    drop(reader);
    let properties = audio::probe_audio_properties(path).map_err(|e| crate::db::Error::Corruption(e.to_string()))?;

    let mut tx = session.write().await?;

    // Step 2d: duplicate MBID elsewhere in the catalog wins over this
    // path; this file is skipped rather than creating a second track
    // for the same recording.
    if let Some(recording_mbid) = tags.musicbrainz_recording_id.as_deref() {
        if let Some(row) =
            sqlx::query("SELECT absolute_file_path FROM track WHERE recording_mbid = ? AND absolute_file_path != ?")
                .bind(recording_mbid)
                .bind(&path_str)
                .fetch_optional(tx.connection())
                .await
                .map_err(crate::db::Error::from_sqlx)?
        {
            let other_path: String = row.get("absolute_file_path");
            debug!(path = %path_str, other_path, "skipping duplicate recording mbid");
            tx.rollback().await?;
            return Ok(Outcome::SkippedDuplicateMbid);
        }
    }

    let release_id = match &tags.album {
        Some(album) if !album.trim().is_empty() => {
            Some(release::find_or_create(&mut tx, album, album, tags.musicbrainz_release_id.as_deref()).await?)
        }
        _ => None,
    };

    let medium_id = match release_id {
        Some(release_id) => {
            Some(release::find_or_create_medium(&mut tx, release_id, tags.disc_number.map(|d| d as i64), None).await?)
        }
        None => None,
    };

    let name = tags
        .title
        .clone()
        .unwrap_or_else(|| path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default());

    let directory_id = match path.parent().map(|p| p.to_string_lossy().to_string()) {
        Some(p) => directory::find_by_path(&mut tx, &p).await?.map(|d| d.id),
        None => None,
    };

    let parsed = ParsedTrack {
        absolute_file_path: path_str.clone(),
        file_size,
        last_write_time,
        is_first_scan,
        scan_version,
        duration_ms: properties.duration_ms,
        bitrate: properties.bitrate,
        sample_rate: properties.sample_rate,
        bits_per_sample: properties.bits_per_sample,
        channels: properties.channels,
        name,
        track_number: tags.track_number,
        disc_number: tags.disc_number,
        date: tags.date.as_deref().map(PartialDateTime::from_str).unwrap_or(PartialDateTime::invalid()),
        original_date: tags
            .original_date
            .as_deref()
            .map(PartialDateTime::from_str)
            .unwrap_or(PartialDateTime::invalid()),
        track_mbid: tags.musicbrainz_track_id.clone(),
        recording_mbid: tags.musicbrainz_recording_id.clone(),
        copyright: tags.copyright.clone(),
        copyright_url: None,
        advisory: Advisory::Unset,
        comment: tags.comment.clone(),
        track_replay_gain: tags.replay_gain_track,
        release_replay_gain: tags.replay_gain_album,
        artist_display_name: tags.artists.first().cloned(),
        release_id,
        medium_id,
        directory_id,
        media_library_id: Some(library_id),
    };

    let was_new = track::find_by_path(&mut tx, &path_str).await?.is_none();
    let track_id = track::upsert(&mut tx, &parsed).await?;

    // Step 2e: artist resolution and link rewrite.
    let mut links = Vec::new();
    for artist_name in &tags.artists {
        let artist_id = artist::find_or_create(
            &mut tx,
            artist_name,
            tags.artist_sort.as_deref().unwrap_or(artist_name),
            tags.musicbrainz_artist_id.as_deref(),
        )
        .await?;
        links.push((
            artist_id,
            ArtistLinkRole::Artist,
            None,
            tags.musicbrainz_artist_id.is_some(),
            artist_name.clone(),
            tags.artist_sort.clone().unwrap_or_else(|| artist_name.clone()),
        ));
    }
    track::set_artist_links(&mut tx, track_id, &links).await?;

    // Step 2f: embedded image dedup.
    image_db::clear_image_links(&mut tx, track_id).await?;
    for (index, picture) in tags.embedded_images.iter().enumerate() {
        let content_hash = hash::hash_bytes(&picture.data);
        let dims = image_probe::probe_dimensions(&picture.data)
            .map(|(d, _)| d)
            .unwrap_or(image_probe::ImageDimensions { width: 0, height: 0 });
        let image_id = image_db::find_or_create_image(
            &mut tx,
            picture.data.len() as i64,
            content_hash,
            dims.width,
            dims.height,
            &picture.mime_type,
        )
        .await?;
        let image_type = if picture.picture_type.contains("CoverFront") || index == 0 {
            EmbeddedImageType::FrontCover
        } else {
            EmbeddedImageType::Other
        };
        image_db::link_image_to_track(&mut tx, track_id, image_id, index as i64, image_type, None).await?;
    }

    // Step 2g: genre clusters.
    if !tags.genres.is_empty() {
        let genre_type = cluster::find_or_create_type(&mut tx, "genre").await?;
        let mut cluster_ids = Vec::new();
        for genre in &tags.genres {
            cluster_ids.push(cluster::find_or_create(&mut tx, genre_type, genre).await?);
        }
        track::set_clusters(&mut tx, track_id, &cluster_ids).await?;
    }

    // Step 2h: lyrics, embedded first, then an adjacent .lrc file.
    let mut lyric_rows = Vec::new();
    for embedded in &tags.embedded_lyrics {
        let content = match &embedded.synchronized_lines {
            Some(lines) => crate::db::models::LyricsContent::Synchronized(
                lines
                    .iter()
                    .map(|(ms, text)| crate::db::models::SyncedLyricsLine {
                        offset_ms: *ms as i64,
                        text: text.clone(),
                    })
                    .collect(),
            ),
            None => crate::db::models::LyricsContent::Unsynchronized(embedded.text.clone()),
        };
        lyric_rows.push((true, None, embedded.language.clone(), 0, content));
    }
    if let Some(sidecar) = find_sidecar_lyrics(path) {
        if let Ok(text) = std::fs::read_to_string(&sidecar) {
            let content = match lyrics_parser::parse(&text) {
                lyrics_parser::ParsedLyrics::Synchronized(lines) => crate::db::models::LyricsContent::Synchronized(
                    lines
                        .into_iter()
                        .map(|l| crate::db::models::SyncedLyricsLine {
                            offset_ms: l.offset_ms as i64,
                            text: l.text,
                        })
                        .collect(),
                ),
                lyrics_parser::ParsedLyrics::Unsynchronized(text) => {
                    crate::db::models::LyricsContent::Unsynchronized(text)
                }
            };
            lyric_rows.push((false, Some(sidecar.to_string_lossy().to_string()), None, 0, content));
        }
    }
    if !lyric_rows.is_empty() {
        lyrics_db::replace_for_track(&mut tx, track_id, &lyric_rows).await?;
    }

    tx.commit().await?;
    Ok(if was_new { Outcome::Added } else { Outcome::Updated })
}

fn find_sidecar_lyrics(audio_path: &Path) -> Option<std::path::PathBuf> {
    let candidate = audio_path.with_extension("lrc");
    candidate.exists().then_some(candidate)
}

fn system_time_to_partial(time: std::time::SystemTime) -> PartialDateTime {
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    PartialDateTime::from_str(&datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Step 3: deletes catalog rows nothing references any more. A track
/// whose file disappeared from disk is the root cause; everything else
/// (artists, releases, clusters, directories) cascades from there once
/// their last referencing track is gone.
async fn reconcile_orphans(
    tx: &mut crate::db::WriteTransaction,
    library_id: MediaLibraryId,
    discovered_paths: &HashSet<String>,
    stats: &mut ScanStats,
) -> crate::db::Result<()> {
    for track_id in track::find_orphan_ids(tx, library_id).await? {
        let row = track::find_by_id(tx, track_id).await?;
        if !discovered_paths.contains(&row.absolute_file_path) {
            track::delete(tx, track_id).await?;
            stats.tracks_removed += 1;
        }
    }
    for artist_id in artist::find_orphan_ids(tx).await? {
        artist::delete(tx, artist_id).await?;
        stats.artists_removed += 1;
    }
    for release_id in release::find_orphan_ids(tx).await? {
        release::delete(tx, release_id).await?;
        stats.releases_removed += 1;
    }
    for cluster_id in cluster::find_orphan_ids(tx).await? {
        sqlx::query("DELETE FROM cluster WHERE id = ?")
            .bind(cluster_id.value())
            .execute(tx.connection())
            .await
            .map_err(crate::db::Error::from_sqlx)?;
    }
    for directory_id in directory::find_orphan_ids(tx).await? {
        directory::delete(tx, directory_id).await?;
    }
    for image_id in image_db::find_orphan_image_ids(tx).await? {
        sqlx::query("DELETE FROM artwork WHERE embedded_image_id = ?")
            .bind(image_id.value())
            .execute(tx.connection())
            .await
            .map_err(crate::db::Error::from_sqlx)?;
        sqlx::query("DELETE FROM track_embedded_image WHERE id = ?")
            .bind(image_id.value())
            .execute(tx.connection())
            .await
            .map_err(crate::db::Error::from_sqlx)?;
    }
    Ok(())
}

/// Step 4: for each release, picks a front-cover image from one of its
/// tracks as the preferred artwork.
async fn recompute_preferred_artwork(tx: &mut crate::db::WriteTransaction) -> crate::db::Result<()> {
    let release_ids: Vec<i64> = sqlx::query("SELECT id FROM release")
        .fetch_all(tx.connection())
        .await
        .map_err(crate::db::Error::from_sqlx)?
        .iter()
        .map(|r| r.get::<i64, _>("id"))
        .collect();

    for release_id in release_ids {
        let track_row = sqlx::query(
            "SELECT track.id FROM track WHERE track.release_id = ? ORDER BY track.disc_number, track.track_number LIMIT 1",
        )
        .bind(release_id)
        .fetch_optional(tx.connection())
        .await
        .map_err(crate::db::Error::from_sqlx)?;

        let Some(track_row) = track_row else { continue };
        let track_id = TrackId::new(track_row.get::<i64, _>("id"));
        let release_id = crate::ids::ReleaseId::new(release_id);

        if let Some(link) = image_db::find_front_cover_link(tx, track_id).await? {
            let artwork_id = image_db::find_or_create_embedded_artwork(tx, link.image_id).await?;
            release::set_preferred_artwork(tx, release_id, Some(artwork_id)).await?;
            continue;
        }

        // Lowest-priority pick: a cover file sitting next to the
        // tracks when nothing embedded qualifies as a front cover.
        let track = track::find_by_id(tx, track_id).await?;
        if let Some(cover_path) = find_standalone_cover(Path::new(&track.absolute_file_path)) {
            let artwork_id = image_db::find_or_create_standalone_artwork(tx, &cover_path.to_string_lossy()).await?;
            release::set_preferred_artwork(tx, release_id, Some(artwork_id)).await?;
        }
    }
    Ok(())
}

const STANDALONE_COVER_NAMES: &[&str] = &["cover.jpg", "cover.jpeg", "cover.png", "folder.jpg", "folder.png"];

fn find_standalone_cover(track_path: &Path) -> Option<std::path::PathBuf> {
    let dir = track_path.parent()?;
    STANDALONE_COVER_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}
