//! HTTP transport and entrypoint dispatch: one axum router maps every
//! `/rest/*` path (with or without a trailing `.view`) onto a
//! structured handler, except the three binary endpoints which stream
//! bytes directly.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::Config;
use crate::db::pool::SessionPool;
use crate::scanner::ScannerService;

use super::auth::{self, CredentialVerifier, PermissiveVerifier};
use super::context::{self, Arena, ProtocolVersion, RequestContext, ResponseFormat, MIN_SUPPORTED_VERSION, SERVER_VERSION};
use super::error::ApiError;
use super::handlers;
use super::response::{to_json, to_xml, Response};

#[derive(Clone)]
pub struct AppState {
    pub pool: SessionPool,
    pub config: Arc<Config>,
    pub scanner: ScannerService,
    pub verifier: Arc<dyn CredentialVerifier>,
}

impl AppState {
    pub fn new(pool: SessionPool, config: Config, scanner: ScannerService) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            scanner,
            verifier: Arc::new(PermissiveVerifier),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/rest/stream", get(crate::streaming::stream_handler))
        .route("/rest/stream.view", get(crate::streaming::stream_handler))
        .route("/rest/download", get(crate::streaming::download_handler))
        .route("/rest/download.view", get(crate::streaming::download_handler))
        .route("/rest/getCoverArt", get(crate::streaming::cover_art_handler))
        .route("/rest/getCoverArt.view", get(crate::streaming::cover_art_handler))
        .route("/rest/*path", get(handle_structured))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Collects query pairs into a parameter map, joining repeated keys
/// (`id=1&id=2`) with `\u{1}` so handlers can still recover the full
/// list via `RequestContext::params_multi`.
fn collect_params(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    let mut params: HashMap<String, String> = HashMap::new();
    for (key, value) in pairs {
        params
            .entry(key)
            .and_modify(|existing| {
                existing.push('\u{1}');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    params
}

fn entry_point_name(path: &str) -> &str {
    let path = path.trim_start_matches('/');
    path.strip_suffix(".view").unwrap_or(path)
}

fn negotiate_version(client: ProtocolVersion, server: ProtocolVersion) -> Result<(), ApiError> {
    if client.major > server.major {
        return Err(ApiError::ServerMustUpgrade);
    }
    if client.major < server.major {
        return Err(ApiError::ClientMustUpgrade);
    }
    if client.minor > server.minor || (client.minor == server.minor && client.patch > server.patch) {
        return Err(ApiError::ServerMustUpgrade);
    }
    Ok(())
}

async fn handle_structured(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> HttpResponse {
    let params = collect_params(pairs);
    let entry_point = entry_point_name(&path).to_string();
    let format = match params.get("f").map(String::as_str) {
        Some("json") | Some("jsonp") => ResponseFormat::Json,
        _ => ResponseFormat::Xml,
    };

    match build_context_and_dispatch(&state, &entry_point, params, format, &headers).await {
        Ok(response) => render(format, &response),
        Err(error) => {
            let protocol_version = context::SERVER_PROTOCOL_VERSION.to_string();
            let response = Response::failed(SERVER_VERSION, &protocol_version, false, error.code(), &error.message());
            render(format, &response)
        }
    }
}

fn render(format: ResponseFormat, response: &Response) -> HttpResponse {
    match format {
        ResponseFormat::Json => {
            let body = to_json(response);
            ([(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        ResponseFormat::Xml => {
            let arena = Arena::new();
            let body = to_xml(response, &arena);
            ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
        }
    }
}

/// The header value a trusted reverse proxy set to the already-verified
/// username, if `config.trusted_header_name` is configured and the
/// request carried it.
fn trusted_header_value<'a>(state: &AppState, headers: &'a HeaderMap) -> Option<&'a str> {
    let name = state.config.trusted_header_name.as_deref()?;
    headers.get(name)?.to_str().ok()
}

async fn build_context_and_dispatch(
    state: &AppState,
    entry_point: &str,
    params: HashMap<String, String>,
    format: ResponseFormat,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let client_name = params.get("c").cloned().unwrap_or_default();
    let requested_version = params
        .get("v")
        .and_then(|v| ProtocolVersion::parse(v))
        .unwrap_or(MIN_SUPPORTED_VERSION);

    let reported_version = if state.config.reports_old_protocol_to(&client_name) {
        ProtocolVersion::new(1, 12, 0)
    } else {
        context::SERVER_PROTOCOL_VERSION
    };

    if entry_point == "ping" {
        negotiate_version(requested_version, reported_version)?;
        return Ok(Response::ok(SERVER_VERSION, reported_version.to_string().as_str(), false));
    }

    negotiate_version(requested_version, reported_version)?;
    let open_subsonic_enabled = context::open_subsonic_enabled_for(&state.config, &client_name, requested_version);

    let user = {
        let mut session = state.pool.session().await.map_err(ApiError::from)?;
        let mut tx = session.read().await.map_err(ApiError::from)?;
        let user = auth::resolve(&mut tx, &state.config, state.verifier.as_ref(), &params, trusted_header_value(state, headers)).await?;
        tx.finish().await.map_err(ApiError::from)?;
        user
    };

    let ctx = RequestContext {
        params,
        user,
        client_name,
        protocol_version: reported_version,
        format,
        open_subsonic_enabled,
        arena: Arena::new(),
    };

    dispatch(entry_point, &ctx, state).await
}

/// The entrypoint map: routes a stripped path to its handler. Unknown
/// paths are `UnknownEntryPoint`; admin-only handlers enforce their
/// own user-type gate via `RequestContext::require_admin`.
async fn dispatch(entry_point: &str, ctx: &RequestContext, state: &AppState) -> Result<Response, ApiError> {
    use handlers::*;

    match entry_point {
        "ping" => Ok(Response::ok(SERVER_VERSION, ctx.protocol_version.to_string().as_str(), ctx.open_subsonic_enabled)),
        "getLicense" => system::get_license(ctx),
        "getMusicFolders" => browse::get_music_folders(ctx, &state.pool).await,
        "getIndexes" => browse::get_indexes(ctx, &state.pool).await,
        "getArtists" => browse::get_artists(ctx, &state.pool).await,
        "getArtist" => browse::get_artist(ctx, &state.pool).await,
        "getAlbum" => browse::get_album(ctx, &state.pool).await,
        "getSong" => browse::get_song(ctx, &state.pool).await,
        "getGenres" => browse::get_genres(ctx, &state.pool).await,
        "getAlbumList" | "getAlbumList2" => browse::get_album_list(ctx, &state.pool).await,
        "search2" | "search3" => search::search(ctx, &state.pool, entry_point == "search3").await,
        "getSimilarSongs" | "getSimilarSongs2" => search::get_similar_songs(ctx, &state.pool).await,
        "getPlaylists" => playlist::get_playlists(ctx, &state.pool).await,
        "getPlaylist" => playlist::get_playlist(ctx, &state.pool).await,
        "createPlaylist" => playlist::create_playlist(ctx, &state.pool).await,
        "updatePlaylist" => playlist::update_playlist(ctx, &state.pool).await,
        "deletePlaylist" => playlist::delete_playlist(ctx, &state.pool).await,
        "getBookmarks" => media::get_bookmarks(ctx, &state.pool).await,
        "createBookmark" => media::create_bookmark(ctx, &state.pool).await,
        "deleteBookmark" => media::delete_bookmark(ctx, &state.pool).await,
        "getPlayQueue" => media::get_play_queue(ctx, &state.pool).await,
        "savePlayQueue" => media::save_play_queue(ctx, &state.pool).await,
        "star" => media::star(ctx, &state.pool).await,
        "unstar" => media::unstar(ctx, &state.pool).await,
        "scrobble" => media::scrobble(ctx, &state.pool).await,
        "getLyrics" => lyrics::get_lyrics(ctx, &state.pool).await,
        "getLyricsBySongId" => lyrics::get_lyrics_by_song_id(ctx, &state.pool).await,
        "getUser" => user::get_user(ctx, &state.pool).await,
        "getUsers" => user::get_users(ctx, &state.pool).await,
        "createUser" => user::create_user(ctx, &state.pool).await,
        "updateUser" => user::update_user(ctx, &state.pool).await,
        "deleteUser" => user::delete_user(ctx, &state.pool).await,
        "changePassword" => user::change_password(ctx),
        "getPodcasts" => system::get_podcasts(ctx, &state.pool).await,
        "getScanStatus" => system::get_scan_status(ctx, &state.scanner).await,
        "startScan" => system::start_scan(ctx, &state.scanner),
        _ => {
            warn!(entry_point, "unknown entry point");
            Err(ApiError::UnknownEntryPoint)
        }
    }
}

