mod support;

use lms::db::models::Advisory;
use lms::db::pool::SessionPool;
use lms::db::track::{self, ParsedTrack};
use lms::db::{directory, user};
use lms::db::models::UserType;
use lms::primitives::PartialDateTime;

fn parsed(path: &str, library: lms::ids::MediaLibraryId, is_first_scan: bool) -> ParsedTrack {
    ParsedTrack {
        absolute_file_path: path.to_string(),
        file_size: 1234,
        last_write_time: PartialDateTime::from_str("2024-01-01"),
        scan_version: 1,
        is_first_scan,
        duration_ms: 180_000,
        bitrate: Some(320),
        sample_rate: Some(44100),
        bits_per_sample: None,
        channels: Some(2),
        name: "Some Track".to_string(),
        track_number: Some(1),
        disc_number: None,
        date: PartialDateTime::invalid(),
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
        media_library_id: Some(library),
    }
}

/// Re-upserting the exact same file twice (same path/size/mtime, as a
/// second scan pass over an unchanged library would) must not create a
/// second row.
#[tokio::test]
async fn rescanning_an_unchanged_file_is_idempotent() {
    let tempdir = tempfile::tempdir().unwrap();
    let pool = SessionPool::connect(&tempdir.path().join("lms.db"), 4).await.unwrap();

    let session = pool.session().await.unwrap();
    let mut tx = session.write().await.unwrap();
    let library = directory::find_or_create_library(&mut tx, "Music", "/music").await.unwrap();
    let first_id = track::upsert(&mut tx, &parsed("/music/a.flac", library, true)).await.unwrap();
    tx.commit().await.unwrap();

    let session = pool.session().await.unwrap();
    let mut tx = session.write().await.unwrap();
    let second_id = track::upsert(&mut tx, &parsed("/music/a.flac", library, true)).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(first_id, second_id);

    let session = pool.session().await.unwrap();
    let mut tx = session.read().await.unwrap();
    let orphans = track::find_orphan_ids(&mut tx, library).await.unwrap();
    tx.finish().await.unwrap();
    assert_eq!(orphans.len(), 1);
}

/// When a file moves, the pipeline's reconcile-orphans step (a diff of
/// stored paths against what discovery just found) deletes the old row
/// and a later parse-and-upsert creates a new one at the new path.
#[tokio::test]
async fn moving_a_file_orphans_the_old_row_and_creates_a_new_one() {
    let tempdir = tempfile::tempdir().unwrap();
    let pool = SessionPool::connect(&tempdir.path().join("lms.db"), 4).await.unwrap();

    let session = pool.session().await.unwrap();
    let mut tx = session.write().await.unwrap();
    let library = directory::find_or_create_library(&mut tx, "Music", "/music").await.unwrap();
    let old_id = track::upsert(&mut tx, &parsed("/music/old/a.flac", library, true)).await.unwrap();
    tx.commit().await.unwrap();

    // Discovery walks the tree again and finds the file only at its new
    // path; every id not among the newly-discovered paths is an orphan.
    let discovered_paths = ["/music/new/a.flac".to_string()];

    let session = pool.session().await.unwrap();
    let mut tx = session.write().await.unwrap();
    let new_id = track::upsert(&mut tx, &parsed("/music/new/a.flac", library, false)).await.unwrap();

    let all_ids = track::find_orphan_ids(&mut tx, library).await.unwrap();
    for id in &all_ids {
        let row = track::find_by_id(&mut tx, *id).await.unwrap();
        if !discovered_paths.contains(&row.absolute_file_path) {
            track::delete(&mut tx, *id).await.unwrap();
        }
    }
    tx.commit().await.unwrap();

    assert_ne!(old_id, new_id);

    let session = pool.session().await.unwrap();
    let mut tx = session.read().await.unwrap();
    assert!(track::find_by_id(&mut tx, old_id).await.is_err());
    let moved = track::find_by_path(&mut tx, "/music/new/a.flac").await.unwrap().unwrap();
    assert_eq!(moved.id, new_id);
    tx.finish().await.unwrap();
}

/// A library's `first_scan` flag flips once and stays flipped; later
/// passes compute `added_time` from "now" rather than the file's write
/// time.
#[tokio::test]
async fn first_scan_flag_is_sticky_after_being_marked_done() {
    let tempdir = tempfile::tempdir().unwrap();
    let pool = SessionPool::connect(&tempdir.path().join("lms.db"), 4).await.unwrap();

    let session = pool.session().await.unwrap();
    let mut tx = session.write().await.unwrap();
    let library = directory::find_or_create_library(&mut tx, "Music", "/music").await.unwrap();
    assert!(directory::find_library_by_id(&mut tx, library).await.unwrap().first_scan);
    directory::mark_first_scan_done(&mut tx, library).await.unwrap();
    tx.commit().await.unwrap();

    let session = pool.session().await.unwrap();
    let mut tx = session.read().await.unwrap();
    assert!(!directory::find_library_by_id(&mut tx, library).await.unwrap().first_scan);
    tx.finish().await.unwrap();
}

/// `find_orphan_ids` is scoped to the media library it's asked about,
/// so a second library's tracks never contend with the first's
/// reconciliation pass.
#[tokio::test]
async fn orphan_reconciliation_does_not_cross_library_boundaries() {
    let tempdir = tempfile::tempdir().unwrap();
    let pool = SessionPool::connect(&tempdir.path().join("lms.db"), 4).await.unwrap();

    let session = pool.session().await.unwrap();
    let mut tx = session.write().await.unwrap();
    let lib_a = directory::find_or_create_library(&mut tx, "A", "/music-a").await.unwrap();
    let lib_b = directory::find_or_create_library(&mut tx, "B", "/music-b").await.unwrap();
    track::upsert(&mut tx, &parsed("/music-a/x.flac", lib_a, true)).await.unwrap();
    track::upsert(&mut tx, &parsed("/music-b/y.flac", lib_b, true)).await.unwrap();
    tx.commit().await.unwrap();

    let session = pool.session().await.unwrap();
    let mut tx = session.read().await.unwrap();
    assert_eq!(track::find_orphan_ids(&mut tx, lib_a).await.unwrap().len(), 1);
    assert_eq!(track::find_orphan_ids(&mut tx, lib_b).await.unwrap().len(), 1);
    tx.finish().await.unwrap();
}

#[tokio::test]
async fn spawn_app_accepts_requests_against_a_freshly_created_database() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let user_id = support::create_user(&state.pool, "alice", UserType::Admin).await;

    let session = state.pool.session().await.unwrap();
    let mut tx = session.read().await.unwrap();
    let found = user::find_by_id(&mut tx, user_id).await.unwrap();
    tx.finish().await.unwrap();
    assert_eq!(found.name, "alice");
    assert_eq!(found.user_type, UserType::Admin);
}
