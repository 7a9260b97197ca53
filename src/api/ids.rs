//! External identifier encoding: every id the API exposes to a client
//! is prefixed by entity kind so a flat string namespace (as Subsonic's
//! wire format requires) can still be routed back to the right internal
//! table, and cover art ids embed a timestamp so a client's image
//! cache can detect changes.

use crate::ids::{ArtistId, PodcastEpisodeId, ReleaseId, TrackId, TrackListId};

use super::error::ApiError;

pub const ROOT_ID: &str = "root";

pub fn artist_id(id: ArtistId) -> String {
    format!("ar-{}", id.value())
}
pub fn release_id(id: ReleaseId) -> String {
    format!("al-{}", id.value())
}
pub fn track_id(id: TrackId) -> String {
    format!("tr-{}", id.value())
}
pub fn tracklist_id(id: TrackListId) -> String {
    format!("pl-{}", id.value())
}
pub fn podcast_episode_id(id: PodcastEpisodeId) -> String {
    format!("pe-{}", id.value())
}

fn parse_prefixed<K>(prefix: &str, s: &str) -> Option<crate::ids::Id<K>> {
    s.strip_prefix(prefix)?.parse::<i64>().ok().map(crate::ids::Id::new)
}

pub fn parse_artist_id(s: &str) -> Result<ArtistId, ApiError> {
    parse_prefixed("ar-", s).ok_or_else(|| ApiError::generic_bad_parameter("id"))
}
pub fn parse_release_id(s: &str) -> Result<ReleaseId, ApiError> {
    parse_prefixed("al-", s).ok_or_else(|| ApiError::generic_bad_parameter("id"))
}
pub fn parse_track_id(s: &str) -> Result<TrackId, ApiError> {
    parse_prefixed("tr-", s).ok_or_else(|| ApiError::generic_bad_parameter("id"))
}
pub fn parse_tracklist_id(s: &str) -> Result<TrackListId, ApiError> {
    parse_prefixed("pl-", s).ok_or_else(|| ApiError::generic_bad_parameter("id"))
}

/// Any of the library entity ids, used by endpoints like `getCoverArt`
/// and `star`/`unstar` that accept more than one kind in the same
/// parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryId {
    Artist(ArtistId),
    Release(ReleaseId),
    Track(TrackId),
}

pub fn parse_library_id(s: &str) -> Result<LibraryId, ApiError> {
    if let Some(id) = s.strip_prefix("ar-") {
        return id.parse::<i64>().map(|v| LibraryId::Artist(ArtistId::new(v))).map_err(|_| invalid_id());
    }
    if let Some(id) = s.strip_prefix("al-") {
        return id.parse::<i64>().map(|v| LibraryId::Release(ReleaseId::new(v))).map_err(|_| invalid_id());
    }
    if let Some(id) = s.strip_prefix("tr-") {
        return id.parse::<i64>().map(|v| LibraryId::Track(TrackId::new(v))).map_err(|_| invalid_id());
    }
    Err(invalid_id())
}

fn invalid_id() -> ApiError {
    ApiError::generic_bad_parameter("id")
}

/// A cover art id, either embedded (a track's embedded image) or
/// standalone (a release's `cover.jpg`). Encoded as
/// `art-<artwork-id>-<unix-timestamp>` so repeated fetches of a
/// changed image get a different string and bypass client caches.
///
/// Parsing splits the string on `-`: exactly three parts are valid
/// (the literal `art`, the numeric artwork id, and the timestamp).
/// Any other dash count is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverArtId {
    pub artwork_id: crate::ids::ArtworkId,
    pub timestamp: i64,
}

pub fn cover_art_id(artwork_id: crate::ids::ArtworkId, timestamp: i64) -> String {
    format!("art-{}-{}", artwork_id.value(), timestamp)
}

pub fn parse_cover_art_id(s: &str) -> Result<CoverArtId, ApiError> {
    let parts: Vec<&str> = s.split('-').collect();
    let [prefix, artwork_id, timestamp] = parts[..] else {
        return Err(invalid_id());
    };
    if prefix != "art" {
        return Err(invalid_id());
    }
    let artwork_id: i64 = artwork_id.parse().map_err(|_| invalid_id())?;
    let timestamp: i64 = timestamp.parse().map_err(|_| invalid_id())?;
    Ok(CoverArtId {
        artwork_id: crate::ids::ArtworkId::new(artwork_id),
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_artist_id() {
        let id = ArtistId::new(42);
        assert_eq!(parse_artist_id(&artist_id(id)).unwrap(), id);
    }

    #[test]
    fn cover_art_id_round_trips() {
        let encoded = cover_art_id(crate::ids::ArtworkId::new(7), 1_700_000_000);
        let parsed = parse_cover_art_id(&encoded).unwrap();
        assert_eq!(parsed.artwork_id.value(), 7);
        assert_eq!(parsed.timestamp, 1_700_000_000);
    }

    #[test]
    fn cover_art_id_rejects_wrong_part_count() {
        assert!(parse_cover_art_id("art-7").is_err());
        assert!(parse_cover_art_id("art-7-1-2").is_err());
    }

    #[test]
    fn library_id_distinguishes_kinds() {
        assert_eq!(parse_library_id("ar-1").unwrap(), LibraryId::Artist(ArtistId::new(1)));
        assert_eq!(parse_library_id("al-1").unwrap(), LibraryId::Release(ReleaseId::new(1)));
        assert_eq!(parse_library_id("tr-1").unwrap(), LibraryId::Track(TrackId::new(1)));
        assert!(parse_library_id("xx-1").is_err());
    }
}
