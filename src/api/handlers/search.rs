//! Keyword search (`search2`/`search3`) and the recommender bridge
//! (`getSimilarSongs[2]`).
//!
//! This server is not itself a recommender; `SimilarityEngine` is the
//! narrow external interface a real build would point at a running
//! recommender process, mirroring how the scanner's "reload similarity
//! engine" step treats it as an external call with no local
//! implementation (see `crate::scanner::pipeline`).

use crate::db::find::FindParameters;
use crate::db::pool::SessionPool;
use crate::db::{artist, release, track};
use crate::ids::{ArtistId, TrackId};

use super::super::context::RequestContext;
use super::super::error::ApiError;
use super::super::ids;
use super::super::response::{Node, Response};
use super::browse::{artist_node, release_node, track_node};
use super::{bounded_count, ok, read_tx};

/// Resolves the set of tracks a recommender would consider similar to
/// a track or artist. No recommender is wired up in this build, so it
/// always returns an empty set; a deployment that runs one plugs it in
/// behind this trait instead of this file's callers.
pub trait SimilarityEngine: Send + Sync {
    fn similar_track_ids(&self, seed: TrackId, count: usize) -> Vec<TrackId>;
    fn similar_artist_ids(&self, seed: ArtistId, count: usize) -> Vec<ArtistId>;
}

pub struct NullSimilarityEngine;

impl SimilarityEngine for NullSimilarityEngine {
    fn similar_track_ids(&self, _seed: TrackId, _count: usize) -> Vec<TrackId> {
        Vec::new()
    }
    fn similar_artist_ids(&self, _seed: ArtistId, _count: usize) -> Vec<ArtistId> {
        Vec::new()
    }
}

pub async fn search(
    ctx: &RequestContext,
    pool: &SessionPool,
    open_subsonic: bool,
) -> Result<Response, ApiError> {
    let query = ctx.required_param("query")?.to_string();
    let keywords: Vec<String> = query.split_whitespace().map(str::to_string).collect();

    let artist_count = bounded_count(ctx, "artistCount", 20)?;
    let artist_offset = ctx.parsed_param::<i64>("artistOffset")?.unwrap_or(0);
    let album_count = bounded_count(ctx, "albumCount", 20)?;
    let album_offset = ctx.parsed_param::<i64>("albumOffset")?.unwrap_or(0);
    let song_count = bounded_count(ctx, "songCount", 20)?;
    let song_offset = ctx.parsed_param::<i64>("songOffset")?.unwrap_or(0);

    let (_session, mut tx) = read_tx(pool).await?;
    let artists = artist::find(
        &mut tx,
        &FindParameters::new()
            .with_keywords(keywords.clone())
            .with_range(crate::primitives::Range::new(artist_offset.max(0) as usize, artist_count.max(0) as usize)),
    )
    .await?;
    let releases = release::find(
        &mut tx,
        &FindParameters::new()
            .with_keywords(keywords.clone())
            .with_range(crate::primitives::Range::new(album_offset.max(0) as usize, album_count.max(0) as usize)),
    )
    .await?;
    let tracks = track::find(
        &mut tx,
        &FindParameters::new()
            .with_keywords(keywords)
            .with_range(crate::primitives::Range::new(song_offset.max(0) as usize, song_count.max(0) as usize)),
    )
    .await?;
    tx.finish().await?;

    let artist_nodes = artists.iter().map(artist_node).collect();
    let release_nodes = releases.iter().map(release_node).collect();
    let track_nodes = tracks.iter().map(track_node).collect();

    let root_key = if open_subsonic { "searchResult3" } else { "searchResult2" };
    Ok(ok(ctx).with_root(|root| {
        root.with_child(
            root_key,
            Node::new()
                .with_children("artist", artist_nodes)
                .with_children("album", release_nodes)
                .with_children("song", track_nodes),
        )
    }))
}

pub async fn get_similar_songs(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let raw_id = ctx.required_param("id")?;
    let count = bounded_count(ctx, "count", 50)?.max(0) as usize;
    let engine = NullSimilarityEngine;

    let (_session, mut tx) = read_tx(pool).await?;
    let track_ids = match ids::parse_library_id(raw_id)? {
        ids::LibraryId::Track(track_id) => engine.similar_track_ids(track_id, count),
        ids::LibraryId::Artist(artist_id) => {
            let _ = engine.similar_artist_ids(artist_id, count);
            Vec::new()
        }
        ids::LibraryId::Release(_) => Vec::new(),
    };

    let mut nodes = Vec::with_capacity(track_ids.len());
    for track_id in track_ids {
        let found = track::find_by_id(&mut tx, track_id).await?;
        nodes.push(track_node(&found));
    }
    tx.finish().await?;

    Ok(ok(ctx).with_root(|root| root.with_child("similarSongs", Node::new().with_children("song", nodes))))
}

