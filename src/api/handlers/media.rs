//! Bookmarks, play queue, starring and scrobbling: `getBookmarks`,
//! `createBookmark`, `deleteBookmark`, `getPlayQueue`, `savePlayQueue`,
//! `star`, `unstar`, `scrobble`.

use crate::db::pool::SessionPool;
use crate::db::{track, user};

use super::super::context::RequestContext;
use super::super::error::ApiError;
use super::super::ids::{self, LibraryId};
use super::super::response::{Node, Response};
use super::browse::track_node;
use super::{ok, read_tx, write_tx};

pub async fn get_bookmarks(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let (_session, mut tx) = read_tx(pool).await?;
    let bookmarks = user::find_bookmarks_for_user(&mut tx, ctx.user.id).await?;

    let mut nodes = Vec::with_capacity(bookmarks.len());
    for bookmark in &bookmarks {
        let found = track::find_by_id(&mut tx, bookmark.track_id).await?;
        nodes.push(
            Node::new()
                .with_attr("position", bookmark.position_ms)
                .with_attr("username", ctx.user.name.clone())
                .with_opt_attr("comment", bookmark.comment.clone())
                .with_attr("created", bookmark.created_at.to_iso8601_string())
                .with_attr("changed", bookmark.changed_at.to_iso8601_string())
                .with_child("entry", track_node(&found)),
        );
    }
    tx.finish().await?;
    Ok(ok(ctx).with_root(|root| root.with_child("bookmarks", Node::new().with_children("bookmark", nodes))))
}

pub async fn create_bookmark(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let track_id = ids::parse_track_id(ctx.required_param("id")?)?;
    let position_ms = ctx.required_parsed_param::<i64>("position")?;
    let comment = ctx.param("comment").map(str::to_string);

    let (_session, mut tx) = write_tx(pool).await?;
    user::create_bookmark(&mut tx, ctx.user.id, track_id, position_ms, comment.as_deref()).await?;
    tx.commit().await?;
    Ok(ok(ctx))
}

pub async fn delete_bookmark(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let track_id = ids::parse_track_id(ctx.required_param("id")?)?;
    let (_session, mut tx) = write_tx(pool).await?;
    user::delete_bookmark(&mut tx, ctx.user.id, track_id).await?;
    tx.commit().await?;
    Ok(ok(ctx))
}

pub async fn get_play_queue(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let (_session, mut tx) = read_tx(pool).await?;
    let queue = crate::db::tracklist::find_play_queue(&mut tx, ctx.user.id, &ctx.client_name).await?;
    let Some(queue) = queue else {
        tx.finish().await?;
        return Ok(ok(ctx));
    };

    let mut song_nodes = Vec::with_capacity(queue.entries.len());
    for entry in &queue.entries {
        song_nodes.push(track_node(&track::find_by_id(&mut tx, entry.track_id).await?));
    }
    tx.finish().await?;

    Ok(ok(ctx).with_root(|root| {
        root.with_child(
            "playQueue",
            Node::new()
                .with_opt_attr("current", queue.current_index.map(|i| i.to_string()))
                .with_attr("position", queue.current_position_ms)
                .with_attr("username", ctx.user.name.clone())
                .with_children("entry", song_nodes),
        )
    }))
}

pub async fn save_play_queue(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let track_ids = ctx
        .params_multi("id")
        .iter()
        .map(|s| ids::parse_track_id(s))
        .collect::<Result<Vec<_>, _>>()?;
    let current_index = ctx.parsed_param::<i64>("current")?;
    let position_ms = ctx.parsed_param::<i64>("position")?.unwrap_or(0);

    let (_session, mut tx) = write_tx(pool).await?;
    crate::db::tracklist::save_play_queue(
        &mut tx,
        ctx.user.id,
        &ctx.client_name,
        current_index,
        position_ms,
        &track_ids,
    )
    .await?;
    tx.commit().await?;
    Ok(ok(ctx))
}

fn starred_ids(ctx: &RequestContext) -> Result<Vec<LibraryId>, ApiError> {
    let mut ids = Vec::new();
    for raw in ctx.params_multi("id") {
        ids.push(ids::parse_library_id(&raw)?);
    }
    for raw in ctx.params_multi("albumId") {
        ids.push(LibraryId::Release(ids::parse_release_id(&raw)?));
    }
    for raw in ctx.params_multi("artistId") {
        ids.push(LibraryId::Artist(ids::parse_artist_id(&raw)?));
    }
    Ok(ids)
}

pub async fn star(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let targets = starred_ids(ctx)?;
    let (_session, mut tx) = write_tx(pool).await?;
    for target in targets {
        match target {
            LibraryId::Artist(id) => user::star_artist(&mut tx, ctx.user.id, id).await?,
            LibraryId::Release(id) => user::star_release(&mut tx, ctx.user.id, id).await?,
            LibraryId::Track(id) => user::star_track(&mut tx, ctx.user.id, id).await?,
        }
    }
    tx.commit().await?;
    Ok(ok(ctx))
}

/// Records a listen for each submitted track (spec glossary's `Listen`
/// entity). `time` and `now-playing-only` submissions are both
/// accepted but treated identically: this core has no "now playing"
/// broadcast to other clients, so every submission is just logged.
pub async fn scrobble(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let submission = ctx.parsed_param::<bool>("submission")?.unwrap_or(true);
    let track_ids = ctx
        .params_multi("id")
        .iter()
        .map(|s| ids::parse_track_id(s))
        .collect::<Result<Vec<_>, _>>()?;

    if submission {
        let (_session, mut tx) = write_tx(pool).await?;
        for track_id in track_ids {
            user::record_listen(&mut tx, ctx.user.id, track_id).await?;
        }
        tx.commit().await?;
    }
    Ok(ok(ctx))
}

pub async fn unstar(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let targets = starred_ids(ctx)?;
    let (_session, mut tx) = write_tx(pool).await?;
    for target in targets {
        match target {
            LibraryId::Artist(id) => user::unstar_artist(&mut tx, ctx.user.id, id).await?,
            LibraryId::Release(id) => user::unstar_release(&mut tx, ctx.user.id, id).await?,
            LibraryId::Track(id) => user::unstar_track(&mut tx, ctx.user.id, id).await?,
        }
    }
    tx.commit().await?;
    Ok(ok(ctx))
}
