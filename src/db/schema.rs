//! Schema creation, the expected-version check and migrations.

use sqlx::{Executor as _, SqliteConnection};
use tracing::{info, warn};

use super::error::{Error, Result};

/// The schema version this binary expects. Bumped whenever a migration
/// is added below.
pub const EXPECTED_VERSION: i64 = 1;

const CREATE_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS version_info (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        db_version INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS media_library (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        root_path TEXT NOT NULL UNIQUE,
        first_scan INTEGER NOT NULL DEFAULT 1
    )"#,
    r#"CREATE TABLE IF NOT EXISTS directory (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        path TEXT NOT NULL UNIQUE,
        parent_directory_id INTEGER REFERENCES directory(id) ON DELETE CASCADE,
        media_library_id INTEGER REFERENCES media_library(id) ON DELETE CASCADE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS artist (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        sort_name TEXT NOT NULL,
        mbid TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS artwork (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        absolute_file_path TEXT,
        embedded_image_id INTEGER,
        last_written_time TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS release (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        sort_name TEXT NOT NULL,
        mbid TEXT,
        release_group_mbid TEXT,
        total_medium_count INTEGER,
        compilation INTEGER NOT NULL DEFAULT 0,
        barcode TEXT,
        comment TEXT,
        artist_display_name TEXT,
        preferred_artwork_id INTEGER REFERENCES artwork(id) ON DELETE SET NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS release_label (
        release_id INTEGER NOT NULL REFERENCES release(id) ON DELETE CASCADE,
        label TEXT NOT NULL,
        UNIQUE(release_id, label)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS release_country (
        release_id INTEGER NOT NULL REFERENCES release(id) ON DELETE CASCADE,
        country TEXT NOT NULL,
        UNIQUE(release_id, country)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS release_type (
        release_id INTEGER NOT NULL REFERENCES release(id) ON DELETE CASCADE,
        release_type TEXT NOT NULL,
        UNIQUE(release_id, release_type)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS medium (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        release_id INTEGER NOT NULL REFERENCES release(id) ON DELETE CASCADE,
        position INTEGER,
        track_count INTEGER,
        media TEXT,
        replay_gain REAL,
        preferred_artwork_id INTEGER REFERENCES artwork(id) ON DELETE SET NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS track (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        absolute_file_path TEXT NOT NULL UNIQUE,
        file_size INTEGER NOT NULL,
        last_write_time TEXT NOT NULL,
        added_time TEXT NOT NULL,
        scan_version INTEGER NOT NULL,
        duration_ms INTEGER NOT NULL,
        bitrate INTEGER,
        sample_rate INTEGER,
        bits_per_sample INTEGER,
        channels INTEGER,
        name TEXT NOT NULL,
        track_number INTEGER,
        disc_number INTEGER,
        date TEXT,
        original_date TEXT,
        track_mbid TEXT,
        recording_mbid TEXT,
        copyright TEXT,
        copyright_url TEXT,
        advisory TEXT NOT NULL DEFAULT 'unset',
        comment TEXT,
        track_replay_gain REAL,
        release_replay_gain REAL,
        artist_display_name TEXT,
        release_id INTEGER REFERENCES release(id) ON DELETE SET NULL,
        medium_id INTEGER REFERENCES medium(id) ON DELETE SET NULL,
        directory_id INTEGER REFERENCES directory(id) ON DELETE SET NULL,
        media_library_id INTEGER REFERENCES media_library(id) ON DELETE SET NULL,
        preferred_artwork_id INTEGER REFERENCES artwork(id) ON DELETE SET NULL,
        preferred_media_artwork_id INTEGER REFERENCES artwork(id) ON DELETE SET NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS track_artist_link (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        track_id INTEGER NOT NULL REFERENCES track(id) ON DELETE CASCADE,
        artist_id INTEGER NOT NULL REFERENCES artist(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        sub_role TEXT,
        matched_by_mbid INTEGER NOT NULL DEFAULT 0,
        artist_name TEXT NOT NULL,
        artist_sort_name TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS cluster_type (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS cluster (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cluster_type_id INTEGER NOT NULL REFERENCES cluster_type(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        UNIQUE(cluster_type_id, name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS track_cluster_link (
        track_id INTEGER NOT NULL REFERENCES track(id) ON DELETE CASCADE,
        cluster_id INTEGER NOT NULL REFERENCES cluster(id) ON DELETE CASCADE,
        PRIMARY KEY (track_id, cluster_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS track_embedded_image (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        size INTEGER NOT NULL,
        hash TEXT NOT NULL,
        width INTEGER NOT NULL,
        height INTEGER NOT NULL,
        mime_type TEXT NOT NULL,
        UNIQUE(size, hash)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS track_embedded_image_link (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        track_id INTEGER NOT NULL REFERENCES track(id) ON DELETE CASCADE,
        image_id INTEGER NOT NULL REFERENCES track_embedded_image(id) ON DELETE CASCADE,
        idx INTEGER NOT NULL,
        image_type TEXT NOT NULL,
        description TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS track_lyrics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        track_id INTEGER REFERENCES track(id) ON DELETE CASCADE,
        embedded INTEGER NOT NULL,
        external_path TEXT,
        external_stem TEXT,
        external_last_write_time TEXT,
        external_file_size INTEGER,
        language TEXT,
        offset_ms INTEGER,
        display_artist TEXT,
        display_title TEXT,
        synchronized INTEGER NOT NULL DEFAULT 0,
        content_json TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS user (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        user_type TEXT NOT NULL DEFAULT 'regular',
        feedback_backend TEXT NOT NULL DEFAULT 'internal',
        transcoding_enable_by_default INTEGER NOT NULL DEFAULT 0,
        transcoding_default_format TEXT,
        transcoding_default_bitrate INTEGER,
        transcoding_max_bitrate INTEGER,
        subsonic_artist_list_mode TEXT NOT NULL DEFAULT 'all_artists',
        created_at TEXT NOT NULL,
        last_login TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS track_list (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        list_type TEXT NOT NULL,
        visibility TEXT NOT NULL DEFAULT 'private',
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        last_modified TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS track_list_entry (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        track_list_id INTEGER NOT NULL REFERENCES track_list(id) ON DELETE CASCADE,
        track_id INTEGER NOT NULL REFERENCES track(id) ON DELETE CASCADE
    )"#,
    r#"CREATE TABLE IF NOT EXISTS play_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        client_name TEXT NOT NULL,
        current_index INTEGER,
        current_position_ms INTEGER NOT NULL DEFAULT 0,
        UNIQUE(user_id, client_name)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS play_queue_entry (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        play_queue_id INTEGER NOT NULL REFERENCES play_queue(id) ON DELETE CASCADE,
        track_id INTEGER NOT NULL REFERENCES track(id) ON DELETE CASCADE,
        position INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS starred_artist (
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        artist_id INTEGER NOT NULL REFERENCES artist(id) ON DELETE CASCADE,
        starred_date_time TEXT NOT NULL,
        sync_state TEXT NOT NULL DEFAULT 'synchronized',
        PRIMARY KEY (user_id, artist_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS starred_release (
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        release_id INTEGER NOT NULL REFERENCES release(id) ON DELETE CASCADE,
        starred_date_time TEXT NOT NULL,
        sync_state TEXT NOT NULL DEFAULT 'synchronized',
        PRIMARY KEY (user_id, release_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS starred_track (
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        track_id INTEGER NOT NULL REFERENCES track(id) ON DELETE CASCADE,
        starred_date_time TEXT NOT NULL,
        sync_state TEXT NOT NULL DEFAULT 'synchronized',
        PRIMARY KEY (user_id, track_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS track_bookmark (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        track_id INTEGER NOT NULL REFERENCES track(id) ON DELETE CASCADE,
        position_ms INTEGER NOT NULL,
        comment TEXT,
        created_at TEXT NOT NULL,
        changed_at TEXT NOT NULL,
        UNIQUE(user_id, track_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS listen (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES user(id) ON DELETE CASCADE,
        track_id INTEGER NOT NULL REFERENCES track(id) ON DELETE CASCADE,
        listened_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS podcast_episode (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'not_downloaded',
        absolute_file_path TEXT,
        published_at TEXT
    )"#,
    r#"CREATE TABLE IF NOT EXISTS scan_settings (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        media_directories_json TEXT NOT NULL DEFAULT '[]',
        audio_extensions_json TEXT NOT NULL DEFAULT '[]',
        update_period TEXT,
        scan_version INTEGER NOT NULL DEFAULT 1
    )"#,
];

const INDEX_STATEMENTS: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_artist_name ON artist(name)",
    "CREATE INDEX IF NOT EXISTS idx_artist_sort_name ON artist(sort_name COLLATE NOCASE)",
    "CREATE INDEX IF NOT EXISTS idx_artist_mbid ON artist(mbid)",
    "CREATE INDEX IF NOT EXISTS idx_track_path ON track(absolute_file_path)",
    "CREATE INDEX IF NOT EXISTS idx_track_name ON track(name)",
    "CREATE INDEX IF NOT EXISTS idx_track_mbid ON track(track_mbid)",
    "CREATE INDEX IF NOT EXISTS idx_release_name ON release(name)",
    "CREATE INDEX IF NOT EXISTS idx_release_mbid ON release(mbid)",
    "CREATE INDEX IF NOT EXISTS idx_track_release ON track(release_id)",
    "CREATE INDEX IF NOT EXISTS idx_track_year ON track(date)",
    "CREATE INDEX IF NOT EXISTS idx_track_original_year ON track(original_date)",
    "CREATE INDEX IF NOT EXISTS idx_tracklist_name ON track_list(name)",
    "CREATE INDEX IF NOT EXISTS idx_tracklist_user ON track_list(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_track_cluster_link_track ON track_cluster_link(track_id)",
    "CREATE INDEX IF NOT EXISTS idx_track_cluster_link_cluster ON track_cluster_link(cluster_id)",
    "CREATE INDEX IF NOT EXISTS idx_track_artist_link_track ON track_artist_link(track_id)",
    "CREATE INDEX IF NOT EXISTS idx_track_artist_link_artist ON track_artist_link(artist_id, role)",
];

/// Migration statements applied in order when the stored version is
/// older than `EXPECTED_VERSION`. Index `i` upgrades from version `i`
/// to `i + 1`. Some migrations bump `scan_settings.scan_version` so
/// that the next scan refreshes every row.
const MIGRATIONS: &[&[&str]] = &[
    // version 0 -> 1: nothing beyond initial schema creation today.
];

pub async fn ensure_schema(conn: &mut SqliteConnection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON").await?;
    conn.execute("PRAGMA journal_mode = WAL").await?;

    for statement in CREATE_STATEMENTS {
        conn.execute(*statement).await?;
    }

    let row: Option<(i64,)> = sqlx::query_as("SELECT db_version FROM version_info WHERE id = 1")
        .fetch_optional(&mut *conn)
        .await?;

    let found_version = match row {
        Some((v,)) => v,
        None => {
            sqlx::query("INSERT INTO version_info (id, db_version) VALUES (1, 0)")
                .execute(&mut *conn)
                .await?;
            0
        }
    };

    if found_version > EXPECTED_VERSION {
        return Err(Error::SchemaVersionMismatch {
            found: found_version,
            expected: EXPECTED_VERSION,
        });
    }

    if found_version < EXPECTED_VERSION {
        migrate(conn, found_version).await?;
    }

    sqlx::query("INSERT OR IGNORE INTO scan_settings (id) VALUES (1)")
        .execute(&mut *conn)
        .await?;

    for statement in INDEX_STATEMENTS {
        conn.execute(*statement).await?;
    }

    Ok(())
}

async fn migrate(conn: &mut SqliteConnection, from_version: i64) -> Result<()> {
    info!(from_version, to_version = EXPECTED_VERSION, "migrating schema");
    for version in from_version..EXPECTED_VERSION {
        if let Some(statements) = MIGRATIONS.get(version as usize) {
            for statement in *statements {
                conn.execute(*statement).await?;
            }
        } else {
            warn!(version, "no migration registered for this step, skipping");
        }
    }
    sqlx::query("UPDATE version_info SET db_version = ? WHERE id = 1")
        .bind(EXPECTED_VERSION)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
