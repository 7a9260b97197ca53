//! Track finders, the scanner's upsert entry point, and artist/cluster
//! link management.

use sqlx::Row;

use crate::ids::{ArtistId, ArtworkId, ClusterId, DirectoryId, IdRange, MediaLibraryId, MediumId, ReleaseId, TrackId};
use crate::primitives::PartialDateTime;

use super::error::{Error, Result};
use super::find::{cluster_and_filter_fragment, like_escape, push_range, FindParameters, SortMethod};
use super::models::{Advisory, ArtistLinkRole, Track, TrackArtistLink};
use super::pool::{Executor, WriteCapable};

fn opt_date(s: Option<String>) -> PartialDateTime {
    s.map(|s| PartialDateTime::from_str(&s)).unwrap_or(PartialDateTime::invalid())
}

fn row_to_track(row: &sqlx::sqlite::SqliteRow) -> Track {
    Track {
        id: TrackId::new(row.get::<i64, _>("id")),
        absolute_file_path: row.get("absolute_file_path"),
        file_size: row.get::<i64, _>("file_size") as u64,
        last_write_time: opt_date(row.get("last_write_time")),
        added_time: opt_date(row.get("added_time")),
        scan_version: row.get("scan_version"),
        duration_ms: row.get::<i64, _>("duration_ms") as u64,
        bitrate: row.get::<Option<i64>, _>("bitrate").map(|v| v as u32),
        sample_rate: row.get::<Option<i64>, _>("sample_rate").map(|v| v as u32),
        bits_per_sample: row.get::<Option<i64>, _>("bits_per_sample").map(|v| v as u32),
        channels: row.get::<Option<i64>, _>("channels").map(|v| v as u32),
        name: row.get("name"),
        track_number: row.get::<Option<i64>, _>("track_number").map(|v| v as u32),
        disc_number: row.get::<Option<i64>, _>("disc_number").map(|v| v as u32),
        date: opt_date(row.get("date")),
        original_date: opt_date(row.get("original_date")),
        track_mbid: row.get("track_mbid"),
        recording_mbid: row.get("recording_mbid"),
        copyright: row.get("copyright"),
        copyright_url: row.get("copyright_url"),
        advisory: Advisory::parse(row.get::<String, _>("advisory").as_str()),
        comment: row.get("comment"),
        track_replay_gain: row.get("track_replay_gain"),
        release_replay_gain: row.get("release_replay_gain"),
        artist_display_name: row.get("artist_display_name"),
        release_id: row.get::<Option<i64>, _>("release_id").map(ReleaseId::new),
        medium_id: row.get::<Option<i64>, _>("medium_id").map(MediumId::new),
        directory_id: row.get::<Option<i64>, _>("directory_id").map(DirectoryId::new),
        media_library_id: row.get::<Option<i64>, _>("media_library_id").map(MediaLibraryId::new),
        preferred_artwork_id: row.get::<Option<i64>, _>("preferred_artwork_id").map(ArtworkId::new),
        preferred_media_artwork_id: row
            .get::<Option<i64>, _>("preferred_media_artwork_id")
            .map(ArtworkId::new),
    }
}

pub async fn find_by_id(tx: &mut impl Executor, id: TrackId) -> Result<Track> {
    let row = sqlx::query("SELECT * FROM track WHERE id = ?")
        .bind(id.value())
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
        .ok_or(Error::ObjectNotFound)?;
    Ok(row_to_track(&row))
}

pub async fn find_by_path(tx: &mut impl Executor, path: &str) -> Result<Option<Track>> {
    let row = sqlx::query("SELECT * FROM track WHERE absolute_file_path = ?")
        .bind(path)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(row.as_ref().map(row_to_track))
}

pub async fn find(tx: &mut impl Executor, params: &FindParameters) -> Result<Vec<Track>> {
    let mut sql = String::from("SELECT DISTINCT track.* FROM track");
    let mut conditions = Vec::new();

    if !params.clusters.is_empty() {
        if let Some(fragment) = cluster_and_filter_fragment(&params.clusters, "track.id") {
            conditions.push(fragment);
        }
    }
    for term in params.keywords.iter().map(|k| like_escape(k)) {
        conditions.push(format!(
            "track.name LIKE '{}' ESCAPE '\\'",
            term.replace('\'', "''")
        ));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    match params.sort_method {
        SortMethod::Name => sql.push_str(" ORDER BY track.name COLLATE NOCASE"),
        SortMethod::Date | SortMethod::DateDesc => {
            sql.push_str(" ORDER BY track.date");
            if params.sort_method == SortMethod::DateDesc {
                sql.push_str(" DESC");
            }
        }
        SortMethod::Random => sql.push_str(" ORDER BY RANDOM()"),
        SortMethod::Added => sql.push_str(" ORDER BY track.added_time DESC"),
        SortMethod::LastWritten => sql.push_str(" ORDER BY track.last_write_time DESC"),
        _ => sql.push_str(" ORDER BY track.medium_id, track.disc_number, track.track_number"),
    }
    push_range(&mut sql, params.range);

    let rows = sqlx::query(&sql)
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(row_to_track).collect())
}

/// Every track of a release, ordered by `(medium.position, track.track_number)`,
/// the order `getAlbum` lists them in.
pub async fn find_for_release(tx: &mut impl Executor, release_id: ReleaseId) -> Result<Vec<Track>> {
    let rows = sqlx::query(
        "SELECT track.* FROM track \
         LEFT JOIN medium ON medium.id = track.medium_id \
         WHERE track.release_id = ? \
         ORDER BY medium.position, track.track_number",
    )
    .bind(release_id.value())
    .fetch_all(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(row_to_track).collect())
}

pub async fn find_ids_under_directory(tx: &mut impl Executor, directory_id: DirectoryId) -> Result<Vec<TrackId>> {
    let rows = sqlx::query("SELECT id FROM track WHERE directory_id = ?")
        .bind(directory_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(|r| TrackId::new(r.get::<i64, _>("id"))).collect())
}

pub async fn find_orphan_ids(tx: &mut impl Executor, media_library_id: MediaLibraryId) -> Result<Vec<TrackId>> {
    // Orphans are rows whose file no longer exists on disk; the scanner
    // determines that set by stat-ing each path itself and passes the
    // resulting ids here for deletion. This finder instead exposes every
    // track id in the library so the scanner can diff it against what
    // it found on disk.
    let rows = sqlx::query("SELECT id FROM track WHERE media_library_id = ?")
        .bind(media_library_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(|r| TrackId::new(r.get::<i64, _>("id"))).collect())
}

pub async fn find_next_id_range(
    tx: &mut impl Executor,
    after: TrackId,
    batch_size: i64,
) -> Result<IdRange<crate::ids::kind::Track>> {
    let row = sqlx::query(
        "SELECT MIN(id) as first, MAX(id) as last FROM \
         (SELECT id FROM track WHERE id > ? ORDER BY id LIMIT ?)",
    )
    .bind(after.value())
    .bind(batch_size)
    .fetch_one(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    let first: Option<i64> = row.get("first");
    let last: Option<i64> = row.get("last");
    match (first, last) {
        (Some(f), Some(l)) => Ok(IdRange {
            first: TrackId::new(f),
            last: TrackId::new(l),
        }),
        _ => Ok(IdRange::empty()),
    }
}

/// Everything the scanner has parsed out of one file, ready to upsert.
#[derive(Debug, Clone)]
pub struct ParsedTrack {
    pub absolute_file_path: String,
    pub file_size: u64,
    pub last_write_time: PartialDateTime,
    pub scan_version: i64,
    /// Whether this is the library's first scan: a brand-new track's
    /// `added_time` uses the file's write time on a first scan,
    /// `now()` on every later scan.
    pub is_first_scan: bool,
    pub duration_ms: u64,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub bits_per_sample: Option<u32>,
    pub channels: Option<u32>,
    pub name: String,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub date: PartialDateTime,
    pub original_date: PartialDateTime,
    pub track_mbid: Option<String>,
    pub recording_mbid: Option<String>,
    pub copyright: Option<String>,
    pub copyright_url: Option<String>,
    pub advisory: Advisory,
    pub comment: Option<String>,
    pub track_replay_gain: Option<f64>,
    pub release_replay_gain: Option<f64>,
    pub artist_display_name: Option<String>,
    pub release_id: Option<ReleaseId>,
    pub medium_id: Option<MediumId>,
    pub directory_id: Option<DirectoryId>,
    pub media_library_id: Option<MediaLibraryId>,
}

/// Inserts a new track row or updates the existing one at the same
/// path, returning its id. The scanner is expected to have already
/// checked `last_write_time`/`file_size` against the stored row and
/// skipped the parse entirely when neither changed.
pub async fn upsert(tx: &mut (impl Executor + WriteCapable), parsed: &ParsedTrack) -> Result<TrackId> {
    if parsed.name.trim().is_empty() {
        return Err(Error::InvalidName("track name must not be empty".into()));
    }

    let existing = sqlx::query("SELECT id FROM track WHERE absolute_file_path = ?")
        .bind(&parsed.absolute_file_path)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;

    if let Some(row) = existing {
        let id: i64 = row.get("id");
        sqlx::query(
            "UPDATE track SET file_size = ?, last_write_time = ?, scan_version = ?, \
             duration_ms = ?, bitrate = ?, sample_rate = ?, bits_per_sample = ?, channels = ?, \
             name = ?, track_number = ?, disc_number = ?, date = ?, original_date = ?, \
             track_mbid = ?, recording_mbid = ?, copyright = ?, copyright_url = ?, advisory = ?, \
             comment = ?, track_replay_gain = ?, release_replay_gain = ?, artist_display_name = ?, \
             release_id = ?, medium_id = ?, directory_id = ?, media_library_id = ? \
             WHERE id = ?",
        )
        .bind(parsed.file_size as i64)
        .bind(parsed.last_write_time.to_iso8601_string())
        .bind(parsed.scan_version)
        .bind(parsed.duration_ms as i64)
        .bind(parsed.bitrate.map(|v| v as i64))
        .bind(parsed.sample_rate.map(|v| v as i64))
        .bind(parsed.bits_per_sample.map(|v| v as i64))
        .bind(parsed.channels.map(|v| v as i64))
        .bind(&parsed.name)
        .bind(parsed.track_number.map(|v| v as i64))
        .bind(parsed.disc_number.map(|v| v as i64))
        .bind(parsed.date.to_iso8601_string())
        .bind(parsed.original_date.to_iso8601_string())
        .bind(&parsed.track_mbid)
        .bind(&parsed.recording_mbid)
        .bind(&parsed.copyright)
        .bind(&parsed.copyright_url)
        .bind(parsed.advisory.as_str())
        .bind(&parsed.comment)
        .bind(parsed.track_replay_gain)
        .bind(parsed.release_replay_gain)
        .bind(&parsed.artist_display_name)
        .bind(parsed.release_id.map(|v| v.value()))
        .bind(parsed.medium_id.map(|v| v.value()))
        .bind(parsed.directory_id.map(|v| v.value()))
        .bind(parsed.media_library_id.map(|v| v.value()))
        .bind(id)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
        return Ok(TrackId::new(id));
    }

    let added_time = if parsed.is_first_scan {
        parsed.last_write_time.to_iso8601_string()
    } else {
        chrono_now_string()
    };
    let result = sqlx::query(
        "INSERT INTO track (absolute_file_path, file_size, last_write_time, added_time, \
         scan_version, duration_ms, bitrate, sample_rate, bits_per_sample, channels, name, \
         track_number, disc_number, date, original_date, track_mbid, recording_mbid, copyright, \
         copyright_url, advisory, comment, track_replay_gain, release_replay_gain, \
         artist_display_name, release_id, medium_id, directory_id, media_library_id) \
         VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
    )
    .bind(&parsed.absolute_file_path)
    .bind(parsed.file_size as i64)
    .bind(parsed.last_write_time.to_iso8601_string())
    .bind(added_time)
    .bind(parsed.scan_version)
    .bind(parsed.duration_ms as i64)
    .bind(parsed.bitrate.map(|v| v as i64))
    .bind(parsed.sample_rate.map(|v| v as i64))
    .bind(parsed.bits_per_sample.map(|v| v as i64))
    .bind(parsed.channels.map(|v| v as i64))
    .bind(&parsed.name)
    .bind(parsed.track_number.map(|v| v as i64))
    .bind(parsed.disc_number.map(|v| v as i64))
    .bind(parsed.date.to_iso8601_string())
    .bind(parsed.original_date.to_iso8601_string())
    .bind(&parsed.track_mbid)
    .bind(&parsed.recording_mbid)
    .bind(&parsed.copyright)
    .bind(&parsed.copyright_url)
    .bind(parsed.advisory.as_str())
    .bind(&parsed.comment)
    .bind(parsed.track_replay_gain)
    .bind(parsed.release_replay_gain)
    .bind(&parsed.artist_display_name)
    .bind(parsed.release_id.map(|v| v.value()))
    .bind(parsed.medium_id.map(|v| v.value()))
    .bind(parsed.directory_id.map(|v| v.value()))
    .bind(parsed.media_library_id.map(|v| v.value()))
    .execute(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(TrackId::new(result.last_insert_rowid()))
}

fn chrono_now_string() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub async fn delete(tx: &mut (impl Executor + WriteCapable), id: TrackId) -> Result<()> {
    sqlx::query("DELETE FROM track WHERE id = ?")
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

pub async fn set_preferred_artwork(
    tx: &mut (impl Executor + WriteCapable),
    id: TrackId,
    artwork_id: Option<ArtworkId>,
) -> Result<()> {
    sqlx::query("UPDATE track SET preferred_artwork_id = ? WHERE id = ?")
        .bind(artwork_id.map(|a| a.value()))
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

/// Replaces a track's artist links wholesale; the scanner always
/// recomputes the full credit list for a track rather than diffing it.
pub async fn set_artist_links(
    tx: &mut (impl Executor + WriteCapable),
    track_id: TrackId,
    links: &[(ArtistId, ArtistLinkRole, Option<String>, bool, String, String)],
) -> Result<()> {
    sqlx::query("DELETE FROM track_artist_link WHERE track_id = ?")
        .bind(track_id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;

    for (artist_id, role, sub_role, matched_by_mbid, artist_name, artist_sort_name) in links {
        sqlx::query(
            "INSERT INTO track_artist_link \
             (track_id, artist_id, role, sub_role, matched_by_mbid, artist_name, artist_sort_name) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(track_id.value())
        .bind(artist_id.value())
        .bind(role.as_str())
        .bind(sub_role)
        .bind(*matched_by_mbid as i64)
        .bind(artist_name)
        .bind(artist_sort_name)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    }
    Ok(())
}

pub async fn find_artist_links(tx: &mut impl Executor, track_id: TrackId) -> Result<Vec<TrackArtistLink>> {
    let rows = sqlx::query("SELECT * FROM track_artist_link WHERE track_id = ?")
        .bind(track_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|row| TrackArtistLink {
            track_id,
            artist_id: ArtistId::new(row.get::<i64, _>("artist_id")),
            role: ArtistLinkRole::parse(row.get::<String, _>("role").as_str())
                .unwrap_or(ArtistLinkRole::Artist),
            sub_role: row.get("sub_role"),
            matched_by_mbid: row.get::<i64, _>("matched_by_mbid") != 0,
            artist_name: row.get("artist_name"),
            artist_sort_name: row.get("artist_sort_name"),
        })
        .collect())
}

/// Replaces a track's cluster assignments wholesale.
pub async fn set_clusters(
    tx: &mut (impl Executor + WriteCapable),
    track_id: TrackId,
    cluster_ids: &[ClusterId],
) -> Result<()> {
    sqlx::query("DELETE FROM track_cluster_link WHERE track_id = ?")
        .bind(track_id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    for cluster_id in cluster_ids {
        sqlx::query("INSERT OR IGNORE INTO track_cluster_link (track_id, cluster_id) VALUES (?, ?)")
            .bind(track_id.value())
            .bind(cluster_id.value())
            .execute(tx.connection())
            .await
            .map_err(Error::from_sqlx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::SessionPool;

    fn sample(path: &str) -> ParsedTrack {
        ParsedTrack {
            absolute_file_path: path.to_string(),
            file_size: 1000,
            last_write_time: PartialDateTime::from_str("2024-01-01"),
            is_first_scan: false,
            scan_version: 1,
            duration_ms: 180_000,
            bitrate: Some(320),
            sample_rate: Some(44100),
            bits_per_sample: None,
            channels: Some(2),
            name: "Track One".into(),
            track_number: Some(1),
            disc_number: Some(1),
            date: PartialDateTime::from_str("2024"),
            original_date: PartialDateTime::invalid(),
            track_mbid: None,
            recording_mbid: None,
            copyright: None,
            copyright_url: None,
            advisory: Advisory::Unset,
            comment: None,
            track_replay_gain: None,
            release_replay_gain: None,
            artist_display_name: None,
            release_id: None,
            medium_id: None,
            directory_id: None,
            media_library_id: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_path() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        let a = upsert(&mut tx, &sample("/music/a.flac")).await.unwrap();
        let b = upsert(&mut tx, &sample("/music/a.flac")).await.unwrap();
        assert_eq!(a, b);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn empty_track_name_is_rejected() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        let mut parsed = sample("/music/b.flac");
        parsed.name = "".into();
        assert!(matches!(upsert(&mut tx, &parsed).await, Err(Error::InvalidName(_))));
    }

    #[tokio::test]
    async fn next_id_range_respects_batch_size_and_terminates() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        for path in ["/music/a.flac", "/music/b.flac", "/music/c.flac"] {
            upsert(&mut tx, &sample(path)).await.unwrap();
        }

        let range = find_next_id_range(&mut tx, TrackId::new(0), 2).await.unwrap();
        assert!(range.is_valid());
        assert!(range.last.value() - range.first.value() + 1 <= 2);

        let past_end = find_next_id_range(&mut tx, TrackId::new(1_000_000), 2).await.unwrap();
        assert!(!past_end.is_valid());
    }
}
