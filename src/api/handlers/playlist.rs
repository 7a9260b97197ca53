//! TrackList CRUD: `getPlaylists`, `getPlaylist`, `createPlaylist`,
//! `updatePlaylist`, `deletePlaylist`, and the owner/public visibility
//! rules gating which lists a caller can see.

use crate::db::models::{TrackListType, TrackListVisibility};
use crate::db::pool::SessionPool;
use crate::db::tracklist;

use super::super::context::RequestContext;
use super::super::error::ApiError;
use super::super::ids;
use super::super::response::{Node, Response};
use super::browse::track_node;
use super::{ok, read_tx, write_tx};
use crate::db::track;

fn playlist_node(list: &crate::db::models::TrackList, song_count: Option<i64>) -> Node {
    Node::new()
        .with_attr("id", ids::tracklist_id(list.id))
        .with_attr("name", list.name.clone())
        .with_attr("owner", list.user_id.value())
        .with_attr("public", list.visibility == TrackListVisibility::Public)
        .with_opt_attr("songCount", song_count)
        .with_attr("changed", list.last_modified.to_iso8601_string())
}

/// A playlist is visible to a caller if they own it or it's public.
fn visible_to(list: &crate::db::models::TrackList, ctx: &RequestContext) -> bool {
    list.visibility == TrackListVisibility::Public || list.user_id == ctx.user.id
}

pub async fn get_playlists(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let (_session, mut tx) = read_tx(pool).await?;
    let lists = tracklist::find_for_user(&mut tx, ctx.user.id).await?;
    let mut nodes = Vec::new();
    for list in lists.into_iter().filter(|l| l.list_type == TrackListType::Playlist && visible_to(l, ctx)) {
        let count = tracklist::find_entries(&mut tx, list.id).await?.len() as i64;
        nodes.push(playlist_node(&list, Some(count)));
    }
    tx.finish().await?;
    Ok(ok(ctx).with_root(|root| root.with_child("playlists", Node::new().with_children("playlist", nodes))))
}

pub async fn get_playlist(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let id = ids::parse_tracklist_id(ctx.required_param("id")?)?;
    let (_session, mut tx) = read_tx(pool).await?;
    let list = tracklist::find_by_id(&mut tx, id).await?;
    if !visible_to(&list, ctx) {
        return Err(ApiError::UserNotAuthorized);
    }
    let entries = tracklist::find_entries(&mut tx, id).await?;
    let mut song_nodes = Vec::with_capacity(entries.len());
    for entry in &entries {
        song_nodes.push(track_node(&track::find_by_id(&mut tx, entry.track_id).await?));
    }
    tx.finish().await?;

    Ok(ok(ctx).with_root(|root| {
        root.with_child("playlist", playlist_node(&list, Some(song_nodes.len() as i64)).with_children("entry", song_nodes))
    }))
}

pub async fn create_playlist(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let name = ctx.required_param("name")?.to_string();
    let track_ids = ctx
        .params_multi("songId")
        .iter()
        .map(|s| ids::parse_track_id(s))
        .collect::<Result<Vec<_>, _>>()?;

    let (_session, mut tx) = write_tx(pool).await?;
    let list_id = tracklist::create(&mut tx, &name, TrackListType::Playlist, TrackListVisibility::Private, ctx.user.id).await?;
    if !track_ids.is_empty() {
        tracklist::append_entries(&mut tx, list_id, &track_ids).await?;
    }
    tx.commit().await?;
    Ok(ok(ctx))
}

pub async fn update_playlist(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let id = ids::parse_tracklist_id(ctx.required_param("playlistId")?)?;
    let to_add = ctx
        .params_multi("songIdToAdd")
        .iter()
        .map(|s| ids::parse_track_id(s))
        .collect::<Result<Vec<_>, _>>()?;
    let to_remove: Vec<i64> = ctx
        .params_multi("songIndexToRemove")
        .iter()
        .map(|s| s.parse::<i64>().map_err(|_| ApiError::generic_bad_parameter("songIndexToRemove")))
        .collect::<Result<Vec<_>, _>>()?;

    let (_session, mut tx) = write_tx(pool).await?;
    let list = tracklist::find_by_id(&mut tx, id).await?;
    if list.user_id != ctx.user.id && !ctx.is_admin() {
        return Err(ApiError::UserNotAuthorized);
    }
    if !to_remove.is_empty() {
        tracklist::remove_entries_at(&mut tx, id, &to_remove).await?;
    }
    if !to_add.is_empty() {
        tracklist::append_entries(&mut tx, id, &to_add).await?;
    }
    tx.commit().await?;
    Ok(ok(ctx))
}

pub async fn delete_playlist(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let id = ids::parse_tracklist_id(ctx.required_param("id")?)?;
    let (_session, mut tx) = write_tx(pool).await?;
    let list = tracklist::find_by_id(&mut tx, id).await?;
    if list.user_id != ctx.user.id && !ctx.is_admin() {
        return Err(ApiError::UserNotAuthorized);
    }
    tracklist::delete(&mut tx, id).await?;
    tx.commit().await?;
    Ok(ok(ctx))
}
