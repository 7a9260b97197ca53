//! Folder/artist/genre browsing and the paginated album list:
//! `getMusicFolders`, `getIndexes`, `getArtists`, `getArtist`,
//! `getAlbum`, `getSong`, `getGenres`, `getAlbumList[2]`, including its
//! `type="byGenre"` variant.

use crate::db::find::{FindParameters, SortMethod};
use crate::db::pool::SessionPool;
use crate::db::{artist, cluster, directory, release, track};
use crate::ids::MediaLibraryId;
use crate::primitives::Range;

use super::super::context::RequestContext;
use super::super::error::ApiError;
use super::super::ids;
use super::super::response::{Node, Response};
use super::{bounded_count, ok, read_tx};

/// The index bucket a name sorts under: its first alphabetic character
/// uppercased, or `#` for anything else.
fn index_letter(name: &str) -> String {
    match name.chars().next() {
        Some(c) if c.is_alphabetic() => c.to_uppercase().to_string(),
        _ => "#".to_string(),
    }
}

/// Fixed epoch-like constant `getIndexes`/`getArtists` report as
/// `lastModified`.
const FIXED_LAST_MODIFIED: i64 = 946_684_800_000;

pub async fn get_music_folders(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let (_session, mut tx) = read_tx(pool).await?;
    let libraries = directory::find_all_libraries(&mut tx).await?;
    tx.finish().await?;

    let folders = libraries
        .into_iter()
        .map(|library| {
            Node::new()
                .with_attr("id", library.id.value())
                .with_attr("name", library.name)
        })
        .collect();
    Ok(ok(ctx).with_root(|root| root.with_child("musicFolders", Node::new().with_children("musicFolder", folders))))
}

fn music_folder_id_param(ctx: &RequestContext) -> Result<Option<MediaLibraryId>, ApiError> {
    ctx.parsed_param::<i64>("musicFolderId").map(|opt| opt.map(MediaLibraryId::new))
}

pub async fn get_indexes(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let requested_library = music_folder_id_param(ctx)?;
    let (_session, mut tx) = read_tx(pool).await?;
    let libraries = directory::find_all_libraries(&mut tx).await?;

    let mut directories = Vec::new();
    for library in &libraries {
        if requested_library.is_some_and(|id| id != library.id) {
            continue;
        }
        directories.extend(directory::find_top_level(&mut tx, library.id).await?);
    }
    tx.finish().await?;

    let mut by_letter: std::collections::BTreeMap<String, Vec<Node>> = std::collections::BTreeMap::new();
    for dir in directories {
        let name = dir.path.rsplit('/').next().unwrap_or(&dir.path).to_string();
        let letter = index_letter(&name);
        let artist_node = Node::new().with_attr("id", dir.id.value()).with_attr("name", name);
        by_letter.entry(letter).or_default().push(artist_node);
    }

    let index_nodes = by_letter
        .into_iter()
        .map(|(letter, artists)| {
            Node::new()
                .with_attr("name", letter)
                .with_children("artist", artists)
        })
        .collect();

    Ok(ok(ctx).with_root(|root| {
        root.with_child(
            "indexes",
            Node::new()
                .with_attr("lastModified", FIXED_LAST_MODIFIED)
                .with_attr("ignoredArticles", "")
                .with_children("index", index_nodes),
        )
    }))
}

pub(super) fn artist_node(artist: &crate::db::models::Artist) -> Node {
    Node::new()
        .with_attr("id", ids::artist_id(artist.id))
        .with_attr("name", artist.name.clone())
}

pub async fn get_artists(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let (_session, mut tx) = read_tx(pool).await?;
    let artists = artist::find(&mut tx, &FindParameters::new().with_sort_method(SortMethod::SortName)).await?;
    tx.finish().await?;

    let mut by_letter: std::collections::BTreeMap<String, Vec<Node>> = std::collections::BTreeMap::new();
    for artist in &artists {
        let letter = index_letter(&artist.sort_name);
        by_letter.entry(letter).or_default().push(artist_node(artist));
    }

    let index_nodes = by_letter
        .into_iter()
        .map(|(letter, artists)| Node::new().with_attr("name", letter).with_children("artist", artists))
        .collect();

    Ok(ok(ctx).with_root(|root| {
        root.with_child(
            "artists",
            Node::new()
                .with_attr("lastModified", FIXED_LAST_MODIFIED)
                .with_attr("ignoredArticles", "")
                .with_children("index", index_nodes),
        )
    }))
}

pub(super) fn release_node(release: &crate::db::models::Release) -> Node {
    Node::new()
        .with_attr("id", ids::release_id(release.id))
        .with_attr("name", release.name.clone())
        .with_opt_attr("artist", release.artist_display_name.clone())
        .with_opt_attr("coverArt", release.preferred_artwork_id.map(|id| ids::cover_art_id(id, chrono::Utc::now().timestamp())))
}

pub async fn get_artist(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let id = ids::parse_artist_id(ctx.required_param("id")?)?;
    let (_session, mut tx) = read_tx(pool).await?;
    let found = artist::find_by_id(&mut tx, id).await?;
    let releases = release::find_for_artist(&mut tx, id).await?;
    tx.finish().await?;

    let releases: Vec<Node> = releases.iter().map(release_node).collect();
    Ok(ok(ctx).with_root(|root| root.with_child("artist", artist_node(&found).with_children("album", releases))))
}

pub(super) fn track_node(track: &crate::db::models::Track) -> Node {
    let artwork_id = track.preferred_media_artwork_id.or(track.preferred_artwork_id);
    Node::new()
        .with_attr("id", ids::track_id(track.id))
        .with_attr("title", track.name.clone())
        .with_opt_attr("album", track.release_id.map(ids::release_id))
        .with_opt_attr("artist", track.artist_display_name.clone())
        .with_opt_attr("track", track.track_number)
        .with_opt_attr("discNumber", track.disc_number)
        .with_attr("duration", (track.duration_ms / 1000) as i64)
        .with_opt_attr("bitRate", track.bitrate)
        .with_attr("size", track.file_size as i64)
        .with_opt_attr("coverArt", artwork_id.map(|id| ids::cover_art_id(id, chrono::Utc::now().timestamp())))
        .with_opt_attr("suffix", suffix_of(&track.absolute_file_path))
        .with_opt_attr("contentType", suffix_of(&track.absolute_file_path).map(|s| mime_for_suffix(&s).to_string()))
        .with_attr("isDir", false)
        .with_attr("type", "music")
}

/// Lowercased file extension, the Subsonic `suffix`/basis for `contentType`.
pub fn suffix_of(path: &str) -> Option<String> {
    std::path::Path::new(path).extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase())
}

pub fn mime_for_suffix(suffix: &str) -> &'static str {
    match suffix {
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "m4a" | "mp4" => "audio/mp4",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

pub async fn get_album(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let id = ids::parse_release_id(ctx.required_param("id")?)?;
    let (_session, mut tx) = read_tx(pool).await?;
    let found = release::find_by_id(&mut tx, id).await?;
    let tracks = track::find_for_release(&mut tx, id).await?;
    tx.finish().await?;

    let track_nodes = tracks.iter().map(track_node).collect();

    Ok(ok(ctx).with_root(|root| root.with_child("album", release_node(&found).with_children("song", track_nodes))))
}

pub async fn get_song(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let id = ids::parse_track_id(ctx.required_param("id")?)?;
    let (_session, mut tx) = read_tx(pool).await?;
    let found = track::find_by_id(&mut tx, id).await?;
    tx.finish().await?;
    Ok(ok(ctx).with_root(|root| root.with_child("song", track_node(&found))))
}

pub async fn get_genres(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let (_session, mut tx) = read_tx(pool).await?;
    let genres = cluster::find_with_counts_by_type_name(&mut tx, "genre").await?;
    tx.finish().await?;

    let nodes = genres
        .into_iter()
        .map(|(cluster, song_count, album_count)| {
            Node::new()
                .with_attr("songCount", song_count)
                .with_attr("albumCount", album_count)
                .with_value(cluster.name)
        })
        .collect();
    Ok(ok(ctx).with_root(|root| root.with_children("genre", nodes)))
}

pub async fn get_album_list(ctx: &RequestContext, pool: &SessionPool) -> Result<Response, ApiError> {
    let list_type = ctx.required_param("type")?.to_string();
    let size = bounded_count(ctx, "size", 10)?;
    let offset = ctx.parsed_param::<i64>("offset")?.unwrap_or(0);

    let sort_method = match list_type.as_str() {
        "newest" => SortMethod::Added,
        "alphabeticalByName" => SortMethod::Name,
        "alphabeticalByArtist" => SortMethod::SortName,
        "random" => SortMethod::Random,
        _ => SortMethod::SortName,
    };

    let (_session, mut tx) = read_tx(pool).await?;

    let mut params = FindParameters::new()
        .with_sort_method(sort_method)
        .with_range(Range::new(offset.max(0) as usize, size.max(0) as usize));

    if list_type == "byGenre" {
        let genre_name = ctx.required_param("genre")?;
        let genre = cluster::find_with_counts_by_type_name(&mut tx, "genre")
            .await?
            .into_iter()
            .find(|(cluster, _, _)| cluster.name == genre_name);
        let Some((genre, _, _)) = genre else {
            tx.finish().await?;
            return Ok(ok(ctx).with_root(|root| root.with_children("album", Vec::new())));
        };
        params = params.with_clusters(vec![genre.id]);
    }

    let releases = release::find(&mut tx, &params).await?;
    tx.finish().await?;

    let nodes = releases.iter().map(release_node).collect();
    Ok(ok(ctx).with_root(|root| root.with_children("album", nodes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_letter_buckets_non_alpha_under_hash() {
        assert_eq!(index_letter("Boards of Canada"), "B");
        assert_eq!(index_letter("(hed) p.e."), "#");
        assert_eq!(index_letter("65daysofstatic"), "#");
    }
}
