//! Lyrics retrieval (`getLyrics`/`getLyricsBySongId`): external
//! lyrics are preferred over embedded ones when both exist for a track.

use crate::db::find::FindParameters;
use crate::db::models::{LyricsContent, TrackLyrics};
use crate::db::pool::SessionPool;
use crate::db::{lyrics, track};

use super::super::context::RequestContext;
use super::super::error::ApiError;
use super::super::ids;
use super::super::response::{Node, Response};
use super::{ok, read_tx};

/// External (non-embedded) lyrics win over embedded ones for the same
/// track; among equals the first row found is used.
fn preferred(candidates: &[TrackLyrics]) -> Option<&TrackLyrics> {
    candidates
        .iter()
        .find(|l| !l.embedded)
        .or_else(|| candidates.first())
}

pub async fn get_lyrics(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let artist = ctx.param("artist").map(str::to_string);
    let title = ctx.param("title").map(str::to_string);

    let mut keywords = Vec::new();
    if let Some(artist) = &artist {
        keywords.push(artist.clone());
    }
    if let Some(title) = &title {
        keywords.push(title.clone());
    }

    let (_session, mut tx) = read_tx(pool).await?;
    let matches = track::find(&mut tx, &FindParameters::new().with_keywords(keywords)).await?;
    let Some(found) = matches.into_iter().next() else {
        tx.finish().await?;
        return Ok(ok(ctx).with_root(|root| root.with_child("lyrics", Node::new())));
    };
    let candidates = lyrics::find_for_track(&mut tx, found.id).await?;
    tx.finish().await?;

    let Some(lyrics) = preferred(&candidates) else {
        return Ok(ok(ctx).with_root(|root| root.with_child("lyrics", Node::new())));
    };

    let text = match &lyrics.content {
        LyricsContent::Unsynchronized(text) => text.clone(),
        LyricsContent::Synchronized(lines) => lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n"),
    };

    Ok(ok(ctx).with_root(|root| {
        root.with_child(
            "lyrics",
            Node::new()
                .with_opt_attr("artist", lyrics.display_artist.clone().or_else(|| found.artist_display_name.clone()))
                .with_attr("title", lyrics.display_title.clone().unwrap_or_else(|| found.name.clone()))
                .with_value(text),
        )
    }))
}

pub async fn get_lyrics_by_song_id(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let track_id = ids::parse_track_id(ctx.required_param("id")?)?;
    let (_session, mut tx) = read_tx(pool).await?;
    let candidates = lyrics::find_for_track(&mut tx, track_id).await?;
    tx.finish().await?;

    let structured_list = candidates
        .iter()
        .map(|l| {
            let mut node = Node::new()
                .with_opt_attr("displayArtist", l.display_artist.clone())
                .with_opt_attr("displayTitle", l.display_title.clone())
                .with_opt_attr("lang", l.language.clone())
                .with_attr("synced", l.is_synchronized());
            node = match &l.content {
                LyricsContent::Unsynchronized(text) => {
                    let lines: Vec<Node> = text.lines().map(|line| Node::new().with_value(line)).collect();
                    node.with_children("line", lines)
                }
                LyricsContent::Synchronized(lines) => {
                    let line_nodes = lines
                        .iter()
                        .map(|line| Node::new().with_attr("start", line.offset_ms).with_value(line.text.clone()))
                        .collect::<Vec<_>>();
                    node.with_children("line", line_nodes)
                }
            };
            node
        })
        .collect::<Vec<_>>();

    Ok(ok(ctx).with_root(|root| root.with_child("lyricsList", Node::new().with_children("structuredLyrics", structured_list))))
}
