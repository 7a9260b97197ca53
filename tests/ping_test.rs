mod support;

use axum::body::to_bytes;
use axum::http::{Request, StatusCode};
use lms::api::build_router;
use lms::db::models::UserType;
use tower::util::ServiceExt;

async fn get(router: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

#[tokio::test]
async fn ping_returns_ok_envelope_with_server_identity() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let router = build_router(state);

    let (status, json) = get(router, "/rest/ping?v=1.16.0&c=test&f=json").await;
    assert_eq!(status, StatusCode::OK);
    let envelope = &json["subsonic-response"];
    assert_eq!(envelope["status"], "ok");
    assert_eq!(envelope["version"], "1.16.0");
    assert_eq!(envelope["serverVersion"], "v3.72.0");
    assert_eq!(envelope["openSubsonic"], true);
}

#[tokio::test]
async fn ping_view_suffix_is_equivalent_to_bare_path() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let router = build_router(state);

    let (status, json) = get(router, "/rest/ping.view?v=1.16.0&c=test&f=json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subsonic-response"]["status"], "ok");
}

#[tokio::test]
async fn ping_xml_format_is_well_formed() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/rest/ping?v=1.16.0&c=test")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/xml"
    );
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(text.contains("<subsonic-response"));
    assert!(text.contains("status=\"ok\""));
}

/// A client behind the server's protocol major version must be told to
/// upgrade itself (code 20), never the reverse.
#[tokio::test]
async fn old_client_major_version_is_told_to_upgrade_itself() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let router = build_router(state);

    let (status, json) = get(router, "/rest/ping?v=0.99.0&c=test&f=json").await;
    assert_eq!(status, StatusCode::OK);
    let envelope = &json["subsonic-response"];
    assert_eq!(envelope["status"], "failed");
    assert_eq!(envelope["error"]["code"], 20);
}

#[tokio::test]
async fn client_ahead_of_server_major_version_asks_server_to_upgrade() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let router = build_router(state);

    let (status, json) = get(router, "/rest/ping?v=2.0.0&c=test&f=json").await;
    assert_eq!(status, StatusCode::OK);
    let envelope = &json["subsonic-response"];
    assert_eq!(envelope["status"], "failed");
    assert_eq!(envelope["error"]["code"], 30);
}

#[tokio::test]
async fn client_ahead_of_server_minor_version_asks_server_to_upgrade() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let router = build_router(state);

    let (status, json) = get(router, "/rest/ping?v=1.17.0&c=test&f=json").await;
    assert_eq!(status, StatusCode::OK);
    let envelope = &json["subsonic-response"];
    assert_eq!(envelope["status"], "failed");
    assert_eq!(envelope["error"]["code"], 30);
}

#[tokio::test]
async fn matching_version_negotiates_cleanly() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let router = build_router(state);

    let (status, json) = get(router, "/rest/ping?v=1.16.0&c=test&f=json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subsonic-response"]["status"], "ok");
}

#[tokio::test]
async fn trusted_header_authenticates_without_any_credential_params() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut config_state = support::spawn_app(tempdir.path()).await;
    config_state.config = std::sync::Arc::new(lms::config::Config {
        trusted_header_name: Some("X-Remote-User".to_string()),
        ..(*config_state.config).clone()
    });
    support::create_user(&config_state.pool, "alice", UserType::Regular).await;
    let router = build_router(config_state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/rest/getUser?v=1.16.0&c=test&f=json&username=alice")
                .header("X-Remote-User", "alice")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["subsonic-response"]["status"], "ok");
}

#[tokio::test]
async fn trusted_header_with_unknown_username_is_unauthorized() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut config_state = support::spawn_app(tempdir.path()).await;
    config_state.config = std::sync::Arc::new(lms::config::Config {
        trusted_header_name: Some("X-Remote-User".to_string()),
        ..(*config_state.config).clone()
    });
    let router = build_router(config_state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/rest/ping?v=1.16.0&c=test&f=json")
                .header("X-Remote-User", "ghost")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    // ping never authenticates: the trusted header only matters once an
    // entry point other than ping/getLicense needs a resolved user.
    assert_eq!(json["subsonic-response"]["status"], "ok");

    let response = router_reject_case(tempdir.path(), "X-Remote-User", "ghost").await;
    assert_eq!(response["subsonic-response"]["error"]["code"], 50);
}

async fn router_reject_case(tempdir: &std::path::Path, header: &str, value: &str) -> serde_json::Value {
    let mut state = support::spawn_app(tempdir).await;
    state.config = std::sync::Arc::new(lms::config::Config {
        trusted_header_name: Some(header.to_string()),
        ..(*state.config).clone()
    });
    let router = build_router(state);
    let response = router
        .oneshot(
            Request::builder()
                .uri("/rest/getUsers?v=1.16.0&c=test&f=json")
                .header(header, value)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn api_key_authenticates_via_permissive_verifier() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    support::create_user(&state.pool, "alice", UserType::Regular).await;
    let router = build_router(state);

    let (status, json) = get(router, "/rest/ping?v=1.16.0&c=test&f=json&apiKey=alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subsonic-response"]["status"], "ok");
}

#[tokio::test]
async fn unknown_api_key_is_rejected() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let router = build_router(state);

    let (status, json) = get(router, "/rest/getUsers?v=1.16.0&c=test&f=json&apiKey=nobody").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subsonic-response"]["error"]["code"], 44);
}

#[tokio::test]
async fn missing_credentials_yield_required_parameter_missing() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let router = build_router(state);

    let (status, json) = get(router, "/rest/getUsers?v=1.16.0&c=test&f=json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subsonic-response"]["error"]["code"], 10);
}

#[tokio::test]
async fn unknown_entry_point_is_a_failed_response() {
    let tempdir = tempfile::tempdir().unwrap();
    let state = support::spawn_app(tempdir.path()).await;
    let router = build_router(state);

    let (status, json) = get(router, "/rest/thisIsNotARealEndpoint?v=1.16.0&c=test&f=json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subsonic-response"]["status"], "failed");
}
