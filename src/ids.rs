//! Strongly-typed entity identifiers.
//!
//! `Id<K>` wraps a 64-bit integer tagged at the type level by entity
//! kind, so an `Id<ArtistKind>` cannot be passed where an
//! `Id<TrackKind>` is expected even though both are plain `i64`s in
//! storage.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// Marker types for each entity kind. These carry no data; they only
/// exist to parameterize `Id<K>`.
pub mod kind {
    macro_rules! marker {
        ($name:ident) => {
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub enum $name {}
        };
    }

    marker!(Artist);
    marker!(Release);
    marker!(Medium);
    marker!(Track);
    marker!(Cluster);
    marker!(ClusterType);
    marker!(Directory);
    marker!(MediaLibrary);
    marker!(TrackEmbeddedImage);
    marker!(Artwork);
    marker!(TrackLyrics);
    marker!(TrackList);
    marker!(TrackListEntry);
    marker!(User);
    marker!(TrackBookmark);
    marker!(Listen);
    marker!(PodcastEpisode);
}

pub type ArtistId = Id<kind::Artist>;
pub type ReleaseId = Id<kind::Release>;
pub type MediumId = Id<kind::Medium>;
pub type TrackId = Id<kind::Track>;
pub type ClusterId = Id<kind::Cluster>;
pub type ClusterTypeId = Id<kind::ClusterType>;
pub type DirectoryId = Id<kind::Directory>;
pub type MediaLibraryId = Id<kind::MediaLibrary>;
pub type TrackEmbeddedImageId = Id<kind::TrackEmbeddedImage>;
pub type ArtworkId = Id<kind::Artwork>;
pub type TrackLyricsId = Id<kind::TrackLyrics>;
pub type TrackListId = Id<kind::TrackList>;
pub type TrackListEntryId = Id<kind::TrackListEntry>;
pub type UserId = Id<kind::User>;
pub type TrackBookmarkId = Id<kind::TrackBookmark>;
pub type ListenId = Id<kind::Listen>;
pub type PodcastEpisodeId = Id<kind::PodcastEpisode>;

/// An opaque, entity-kind-tagged 64-bit identifier. `0` means "invalid"
/// (mirrors the source's `isValid()` convention rather than using a
/// `NonZeroI64` so that `Default` yields the invalid id).
pub struct Id<K> {
    value: i64,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Id<K> {
    pub const INVALID: Self = Self {
        value: 0,
        _kind: PhantomData,
    };

    pub fn new(value: i64) -> Self {
        Self {
            value,
            _kind: PhantomData,
        }
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn is_valid(&self) -> bool {
        self.value != 0
    }
}

impl<K> Default for Id<K> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<K> Clone for Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K> Copy for Id<K> {}

impl<K> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}
impl<K> Eq for Id<K> {}

impl<K> PartialOrd for Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<K> Ord for Id<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<K> std::hash::Hash for Id<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<K> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

impl<K> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<K> FromStr for Id<K> {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>().map(Id::new)
    }
}

/// An inclusive range of ids, used by `findNextIdRange` batched cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange<K> {
    pub first: Id<K>,
    pub last: Id<K>,
}

impl<K> IdRange<K> {
    pub fn empty() -> Self {
        Self {
            first: Id::new(1),
            last: Id::new(0),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.first.value() <= self.last.value()
    }

    pub fn count(&self) -> i64 {
        if self.is_valid() {
            self.last.value() - self.first.value() + 1
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_by_default() {
        let id: ArtistId = Id::default();
        assert!(!id.is_valid());
        assert_eq!(id.value(), 0);
    }

    #[test]
    fn roundtrip_string() {
        let id: TrackId = Id::new(42);
        let s = id.to_string();
        let parsed: TrackId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_kinds_do_not_mix_at_the_type_level() {
        let artist: ArtistId = Id::new(1);
        let track: TrackId = Id::new(1);
        // Both compare equal to themselves but are different Rust types;
        // this is a compile-time property, asserted here only at runtime
        // via their values to keep the test meaningful.
        assert_eq!(artist.value(), track.value());
    }

    #[test]
    fn empty_id_range() {
        let r: IdRange<kind::Track> = IdRange::empty();
        assert!(!r.is_valid());
        assert_eq!(r.count(), 0);
    }
}
