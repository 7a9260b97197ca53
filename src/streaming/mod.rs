//! Binary endpoints: `/stream`, `/download`, `/getCoverArt`.
//! Unlike the structured API in `crate::api`, these answer with real
//! HTTP status codes and raw bytes rather than a response envelope.

mod choice;
mod error;
mod file;
mod transcode;

use std::collections::HashMap;
use std::path::Path;

use axum::extract::{Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};

use crate::api::dispatch::AppState;
use crate::db::models::{Artwork, ArtworkKind};
use crate::db::pool::Executor;
use crate::db::{self, models::Track};
use crate::ids::TrackId;

pub use error::Error;

fn trusted_header_value<'a>(state: &AppState, headers: &'a HeaderMap) -> Option<&'a str> {
    let name = state.config.trusted_header_name.as_deref()?;
    headers.get(name)?.to_str().ok()
}

async fn authenticate(state: &AppState, params: &HashMap<String, String>, headers: &HeaderMap) -> Result<db::models::User, Error> {
    let mut session = state.pool.session().await?;
    let mut tx = session.read().await?;
    let user = crate::api::auth::resolve(&mut tx, &state.config, state.verifier.as_ref(), params, trusted_header_value(state, headers))
        .await
        .map_err(|e| Error::Internal(e.message()))?;
    tx.finish().await?;
    Ok(user)
}

fn required<'a>(params: &'a HashMap<String, String>, name: &'static str) -> Result<&'a str, Error> {
    params.get(name).map(String::as_str).ok_or(Error::MissingParameter(name))
}

fn parsed<T: std::str::FromStr>(params: &HashMap<String, String>, name: &'static str) -> Result<Option<T>, Error> {
    match params.get(name) {
        Some(v) => v.parse().map(Some).map_err(|_| Error::BadParameter(name)),
        None => Ok(None),
    }
}

async fn load_track(tx: &mut impl Executor, params: &HashMap<String, String>) -> Result<Track, Error> {
    let id: i64 = required(params, "id")?.parse().map_err(|_| Error::BadParameter("id"))?;
    Ok(db::track::find_by_id(tx, TrackId::new(id)).await?)
}

fn content_type(track: &Track) -> String {
    crate::api::handlers::browse::suffix_of(&track.absolute_file_path)
        .map(|s| crate::api::handlers::browse::mime_for_suffix(&s).to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn download_filename(track: &Track) -> String {
    let suffix = crate::api::handlers::browse::suffix_of(&track.absolute_file_path);
    match suffix {
        Some(suffix) => format!("{}.{suffix}", track.name),
        None => track.name.clone(),
    }
}

pub async fn download_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    request: Request,
) -> HttpResponse {
    match download_inner(state, params, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn download_inner(state: AppState, params: HashMap<String, String>, request: Request) -> Result<HttpResponse, Error> {
    authenticate(&state, &params, request.headers()).await?;

    let mut session = state.pool.session().await?;
    let mut tx = session.read().await?;
    let track = load_track(&mut tx, &params).await?;
    tx.finish().await?;

    let mime = content_type(&track);
    Ok(file::serve(Path::new(&track.absolute_file_path), &mime, Some(&download_filename(&track)), request).await)
}

pub async fn stream_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    request: Request,
) -> HttpResponse {
    match stream_inner(state, params, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn stream_inner(state: AppState, params: HashMap<String, String>, request: Request) -> Result<HttpResponse, Error> {
    let user = authenticate(&state, &params, request.headers()).await?;

    let mut session = state.pool.session().await?;
    let mut tx = session.read().await?;
    let track = load_track(&mut tx, &params).await?;
    tx.finish().await?;

    let format_param = params.get("format").map(String::as_str);
    let max_bitrate: Option<u32> = parsed(&params, "maxBitRate")?;
    let offset_ms: u64 = parsed(&params, "timeOffset")?.map(|secs: u64| secs * 1000).unwrap_or(0);
    let estimate_content_length = parsed::<bool>(&params, "estimateContentLength")?.unwrap_or(false);

    match choice::choose(&track, &user, format_param, max_bitrate) {
        choice::StreamPlan::File => {
            let mime = content_type(&track);
            Ok(file::serve(Path::new(&track.absolute_file_path), &mime, None, request).await)
        }
        choice::StreamPlan::Transcode(spec) => {
            let input = transcode::InputParameters {
                file_path: Path::new(&track.absolute_file_path),
                duration_ms: track.duration_ms,
                offset_ms,
            };
            let timeout = std::time::Duration::from_secs(state.config.transcode_inactivity_timeout_secs);
            let body = transcode::spawn(&state.config.transcoder_path, &input, &spec, timeout)?;

            let mut builder = axum::http::Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, spec.format.container_mime());
            if estimate_content_length {
                let length = transcode::estimate_content_length(&spec, track.duration_ms.saturating_sub(offset_ms));
                builder = builder.header(header::CONTENT_LENGTH, length.to_string());
            }
            Ok(builder.body(body).map_err(|e| Error::Internal(e.to_string()))?.into_response())
        }
    }
}

const MIN_COVER_ART_SIZE: i64 = 32;
const MAX_COVER_ART_SIZE: i64 = 2048;

pub async fn cover_art_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> HttpResponse {
    match cover_art_inner(state, params, headers).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn cover_art_inner(state: AppState, params: HashMap<String, String>, headers: HeaderMap) -> Result<HttpResponse, Error> {
    authenticate(&state, &params, &headers).await?;

    if let Some(size) = parsed::<i64>(&params, "size")? {
        if !(MIN_COVER_ART_SIZE..=MAX_COVER_ART_SIZE).contains(&size) {
            return Err(Error::BadParameter("size"));
        }
    }

    let raw_id = required(&params, "id")?;
    let cover_art_id = crate::api::ids::parse_cover_art_id(raw_id).map_err(|_| Error::BadParameter("id"))?;

    let mut session = state.pool.session().await?;
    let mut tx = session.read().await?;
    let artwork = db::image::find_artwork_by_id(&mut tx, cover_art_id.artwork_id).await?;

    let (bytes, mime) = match artwork.kind {
        ArtworkKind::Standalone => load_standalone_artwork(&artwork).await?,
        ArtworkKind::Embedded => load_embedded_artwork(&mut tx, &artwork).await?,
    };
    tx.finish().await?;

    let mut response = bytes.into_response();
    if let Ok(value) = HeaderValue::from_str(&mime) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    Ok(response)
}

async fn load_standalone_artwork(artwork: &Artwork) -> Result<(Vec<u8>, String), Error> {
    let path = artwork.absolute_file_path.as_deref().ok_or_else(|| Error::Internal("standalone artwork with no path".into()))?;
    let data = tokio::fs::read(path).await.map_err(|_| db::Error::ObjectNotFound)?;
    let suffix = crate::api::handlers::browse::suffix_of(path).unwrap_or_default();
    let mime = match suffix.as_str() {
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "image/jpeg",
    };
    Ok((data, mime.to_string()))
}

async fn load_embedded_artwork(tx: &mut impl Executor, artwork: &Artwork) -> Result<(Vec<u8>, String), Error> {
    let embedded_image_id = artwork.embedded_image_id.ok_or_else(|| Error::Internal("embedded artwork with no image row".into()))?;
    let image = db::image::find_image_by_id(tx, embedded_image_id).await?;
    let link = db::image::find_link_for_image(tx, embedded_image_id)
        .await?
        .ok_or(db::Error::ObjectNotFound)?;
    let track = db::track::find_by_id(tx, link.track_id).await?;

    let extension = crate::api::handlers::browse::suffix_of(&track.absolute_file_path).unwrap_or_default();
    let reader = crate::metadata::audio::reader_for_extension(&extension).ok_or(db::Error::ObjectNotFound)?;
    let tags = reader
        .read_tags(Path::new(&track.absolute_file_path))
        .map_err(|e| Error::Internal(e.to_string()))?;
    let picture = tags
        .embedded_images
        .into_iter()
        .nth(link.index as usize)
        .ok_or(db::Error::ObjectNotFound)?;

    Ok((picture.data, image.mime_type))
}
