//! Catalog entity types.
//!
//! These are plain data carriers built by the finder modules from query
//! rows; none of them own a connection or know how they were loaded.

use crate::ids::{
    ArtistId, ArtworkId, ClusterId, ClusterTypeId, DirectoryId, ListenId, MediaLibraryId,
    MediumId, PodcastEpisodeId, ReleaseId, TrackBookmarkId, TrackEmbeddedImageId, TrackId,
    TrackListEntryId, TrackListId, TrackLyricsId, UserId,
};
use crate::primitives::{ImageHash, PartialDateTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artist {
    pub id: ArtistId,
    pub name: String,
    pub sort_name: String,
    pub mbid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub id: ReleaseId,
    pub name: String,
    pub sort_name: String,
    pub mbid: Option<String>,
    pub release_group_mbid: Option<String>,
    pub total_medium_count: Option<i64>,
    pub compilation: bool,
    pub barcode: Option<String>,
    pub comment: Option<String>,
    pub artist_display_name: Option<String>,
    pub preferred_artwork_id: Option<ArtworkId>,
    pub labels: Vec<String>,
    pub countries: Vec<String>,
    pub release_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediumKind {
    Cd,
    Digital,
    Vinyl,
    Other,
}

impl MediumKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediumKind::Cd => "cd",
            MediumKind::Digital => "digital",
            MediumKind::Vinyl => "vinyl",
            MediumKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "cd" => MediumKind::Cd,
            "digital" => MediumKind::Digital,
            "vinyl" => MediumKind::Vinyl,
            _ => MediumKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Medium {
    pub id: MediumId,
    pub release_id: ReleaseId,
    pub position: Option<i64>,
    pub track_count: Option<i64>,
    pub media: Option<MediumKind>,
    pub replay_gain: Option<f64>,
    pub preferred_artwork_id: Option<ArtworkId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advisory {
    Unset,
    Clean,
    Explicit,
}

impl Advisory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Advisory::Unset => "unset",
            Advisory::Clean => "clean",
            Advisory::Explicit => "explicit",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "clean" => Advisory::Clean,
            "explicit" => Advisory::Explicit,
            _ => Advisory::Unset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub absolute_file_path: String,
    pub file_size: u64,
    pub last_write_time: PartialDateTime,
    pub added_time: PartialDateTime,
    pub scan_version: i64,
    pub duration_ms: u64,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub bits_per_sample: Option<u32>,
    pub channels: Option<u32>,
    pub name: String,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub date: PartialDateTime,
    pub original_date: PartialDateTime,
    pub track_mbid: Option<String>,
    pub recording_mbid: Option<String>,
    pub copyright: Option<String>,
    pub copyright_url: Option<String>,
    pub advisory: Advisory,
    pub comment: Option<String>,
    pub track_replay_gain: Option<f64>,
    pub release_replay_gain: Option<f64>,
    pub artist_display_name: Option<String>,
    pub release_id: Option<ReleaseId>,
    pub medium_id: Option<MediumId>,
    pub directory_id: Option<DirectoryId>,
    pub media_library_id: Option<MediaLibraryId>,
    pub preferred_artwork_id: Option<ArtworkId>,
    pub preferred_media_artwork_id: Option<ArtworkId>,
}

/// One of the roles a `TrackArtistLink` row can assign; stored as text
/// in `track_artist_link.role` so the set can grow without a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtistLinkRole {
    Artist,
    ReleaseArtist,
    Composer,
    Conductor,
    Lyricist,
    Mixer,
    Performer,
    Producer,
    Remixer,
    Writer,
}

impl ArtistLinkRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtistLinkRole::Artist => "artist",
            ArtistLinkRole::ReleaseArtist => "release_artist",
            ArtistLinkRole::Composer => "composer",
            ArtistLinkRole::Conductor => "conductor",
            ArtistLinkRole::Lyricist => "lyricist",
            ArtistLinkRole::Mixer => "mixer",
            ArtistLinkRole::Performer => "performer",
            ArtistLinkRole::Producer => "producer",
            ArtistLinkRole::Remixer => "remixer",
            ArtistLinkRole::Writer => "writer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "artist" => ArtistLinkRole::Artist,
            "release_artist" => ArtistLinkRole::ReleaseArtist,
            "composer" => ArtistLinkRole::Composer,
            "conductor" => ArtistLinkRole::Conductor,
            "lyricist" => ArtistLinkRole::Lyricist,
            "mixer" => ArtistLinkRole::Mixer,
            "performer" => ArtistLinkRole::Performer,
            "producer" => ArtistLinkRole::Producer,
            "remixer" => ArtistLinkRole::Remixer,
            "writer" => ArtistLinkRole::Writer,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackArtistLink {
    pub track_id: TrackId,
    pub artist_id: ArtistId,
    pub role: ArtistLinkRole,
    pub sub_role: Option<String>,
    pub matched_by_mbid: bool,
    /// The artist name as it appears on this track, which may differ
    /// from `Artist::name` (credited-as names).
    pub artist_name: String,
    pub artist_sort_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterType {
    pub id: ClusterTypeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: ClusterId,
    pub cluster_type_id: ClusterTypeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    pub id: DirectoryId,
    pub path: String,
    pub parent_directory_id: Option<DirectoryId>,
    pub media_library_id: Option<MediaLibraryId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLibrary {
    pub id: MediaLibraryId,
    pub name: String,
    pub root_path: String,
    pub first_scan: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEmbeddedImage {
    pub id: TrackEmbeddedImageId,
    pub size: i64,
    pub hash: ImageHash,
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedImageType {
    FrontCover,
    BackCover,
    Media,
    Other,
}

impl EmbeddedImageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddedImageType::FrontCover => "front_cover",
            EmbeddedImageType::BackCover => "back_cover",
            EmbeddedImageType::Media => "media",
            EmbeddedImageType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "front_cover" => EmbeddedImageType::FrontCover,
            "back_cover" => EmbeddedImageType::BackCover,
            "media" => EmbeddedImageType::Media,
            _ => EmbeddedImageType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackEmbeddedImageLink {
    pub track_id: TrackId,
    pub image_id: TrackEmbeddedImageId,
    pub index: i64,
    pub image_type: EmbeddedImageType,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkKind {
    Standalone,
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub id: ArtworkId,
    pub kind: ArtworkKind,
    pub absolute_file_path: Option<String>,
    pub embedded_image_id: Option<TrackEmbeddedImageId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedLyricsLine {
    pub offset_ms: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LyricsContent {
    Unsynchronized(String),
    Synchronized(Vec<SyncedLyricsLine>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackLyrics {
    pub id: TrackLyricsId,
    pub track_id: Option<TrackId>,
    pub embedded: bool,
    pub external_path: Option<String>,
    pub language: Option<String>,
    pub offset_ms: i64,
    pub display_artist: Option<String>,
    pub display_title: Option<String>,
    pub content: LyricsContent,
}

impl TrackLyrics {
    pub fn is_synchronized(&self) -> bool {
        matches!(self.content, LyricsContent::Synchronized(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackListType {
    Playlist,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackListVisibility {
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackList {
    pub id: TrackListId,
    pub name: String,
    pub list_type: TrackListType,
    pub visibility: TrackListVisibility,
    pub user_id: UserId,
    pub last_modified: PartialDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackListEntry {
    pub id: TrackListEntryId,
    pub track_list_id: TrackListId,
    pub track_id: TrackId,
    /// Position within the list, `0`-based and dense; the finder
    /// reassigns these on delete so there are never gaps.
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayQueueEntry {
    pub track_id: TrackId,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayQueue {
    pub user_id: UserId,
    pub client_name: String,
    pub current_index: Option<i64>,
    pub current_position_ms: i64,
    pub entries: Vec<PlayQueueEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    Admin,
    Regular,
    Demo,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Admin => "admin",
            UserType::Regular => "regular",
            UserType::Demo => "demo",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => UserType::Admin,
            "demo" => UserType::Demo,
            _ => UserType::Regular,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub user_type: UserType,
    pub transcoding_enable_by_default: bool,
    pub transcoding_default_format: Option<String>,
    pub transcoding_default_bitrate: Option<u32>,
    pub transcoding_max_bitrate: Option<u32>,
    pub created_at: PartialDateTime,
    pub last_login: Option<PartialDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackBookmark {
    pub id: TrackBookmarkId,
    pub user_id: UserId,
    pub track_id: TrackId,
    pub position_ms: i64,
    pub comment: Option<String>,
    pub created_at: PartialDateTime,
    pub changed_at: PartialDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listen {
    pub id: ListenId,
    pub user_id: UserId,
    pub track_id: TrackId,
    pub listened_at: PartialDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Synchronized,
    PendingAdd,
    PendingRemove,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Synchronized => "synchronized",
            SyncState::PendingAdd => "pending_add",
            SyncState::PendingRemove => "pending_remove",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending_add" => SyncState::PendingAdd,
            "pending_remove" => SyncState::PendingRemove,
            _ => SyncState::Synchronized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodcastEpisodeState {
    NotDownloaded,
    Downloading,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodcastEpisode {
    pub id: PodcastEpisodeId,
    pub title: String,
    pub state: PodcastEpisodeState,
    pub absolute_file_path: Option<String>,
    pub published_at: Option<PartialDateTime>,
}

/// The catalog-wide scan configuration row (there is exactly one,
/// `id = 1`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub media_directories: Vec<String>,
    pub audio_extensions: Vec<String>,
    pub update_period: Option<String>,
    /// Bumped whenever a settings change should force every track to be
    /// reparsed on the next scan.
    pub scan_version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub db_version: i64,
}
