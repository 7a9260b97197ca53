mod support;

use axum::body::to_bytes;
use axum::http::{Request, StatusCode};
use lms::api::build_router;
use lms::db::directory;
use lms::db::models::{Advisory, UserType};
use lms::db::track::{self, ParsedTrack};
use lms::primitives::PartialDateTime;
use tower::util::ServiceExt;

fn parsed(path: &str, library: lms::ids::MediaLibraryId) -> ParsedTrack {
    ParsedTrack {
        absolute_file_path: path.to_string(),
        file_size: 0,
        last_write_time: PartialDateTime::from_str("2024-01-01"),
        scan_version: 1,
        is_first_scan: true,
        duration_ms: 1_000,
        bitrate: Some(320),
        sample_rate: Some(44100),
        bits_per_sample: None,
        channels: Some(2),
        name: "Fixture Track".to_string(),
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

/// Writes a fixture file under `dir` and a matching track row, returns
/// the track's external (string) id as `getSong`-style handlers need it.
async fn seed_track(tempdir: &std::path::Path, pool: &lms::db::pool::SessionPool, filename: &str, bytes: &[u8]) -> i64 {
    let file_path = tempdir.join(filename);
    tokio::fs::write(&file_path, bytes).await.unwrap();

    let session = pool.session().await.unwrap();
    let mut tx = session.write().await.unwrap();
    let library = directory::find_or_create_library(&mut tx, "Music", tempdir.to_str().unwrap()).await.unwrap();
    let track_id = track::upsert(&mut tx, &parsed(file_path.to_str().unwrap(), library)).await.unwrap();
    tx.commit().await.unwrap();
    track_id.value()
}

#[tokio::test]
async fn download_serves_the_original_file_bytes_with_disposition_header() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    support::create_user(&state.pool, "alice", UserType::Regular).await;
    let id = seed_track(tempdir.path(), &state.pool, "fixture.mp3", b"fake mp3 bytes").await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/rest/download?u=alice&p=x&v=1.16.0&c=test&id={id}"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "audio/mpeg");
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"Fixture Track.mp3\""
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"fake mp3 bytes");
}

#[tokio::test]
async fn stream_with_format_raw_serves_the_original_file() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    support::create_user(&state.pool, "alice", UserType::Regular).await;
    let id = seed_track(tempdir.path(), &state.pool, "fixture.mp3", b"raw passthrough bytes").await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/rest/stream?u=alice&p=x&v=1.16.0&c=test&id={id}&format=raw"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"raw passthrough bytes");
}

#[tokio::test]
async fn stream_honors_range_requests_against_the_original_file() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    support::create_user(&state.pool, "alice", UserType::Regular).await;
    let id = seed_track(tempdir.path(), &state.pool, "fixture.mp3", b"0123456789").await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/rest/stream?u=alice&p=x&v=1.16.0&c=test&id={id}&format=raw"))
                .header("Range", "bytes=2-5")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"2345");
}

#[tokio::test]
async fn download_of_missing_track_id_is_not_found() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    support::create_user(&state.pool, "alice", UserType::Regular).await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/rest/download?u=alice&p=x&v=1.16.0&c=test&id=999")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stream_without_credentials_is_unauthorized() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let id = seed_track(tempdir.path(), &state.pool, "fixture.mp3", b"bytes").await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/rest/stream?v=1.16.0&c=test&id={id}"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Auth failures surface as a non-2xx response rather than any bytes
    // being streamed back.
    assert_ne!(response.status(), StatusCode::OK);
}
