//! Decides, per request, whether `/stream` serves the original file or
//! spawns a transcode.

use crate::db::models::{Track, User};

/// The transcoded container/codec pairs a deployment's transcoder can
/// produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Mp3,
    OggOpus,
    OggVorbis,
    MatroskaOpus,
    WebmVorbis,
}

impl OutputFormat {
    /// Subsonic's `format`/user-default string to internal format;
    /// unrecognized strings map to nothing, not a fallback, so the
    /// caller can tell "unset" from "unknown".
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mp3" => Some(Self::Mp3),
            "opus" => Some(Self::OggOpus),
            "vorbis" => Some(Self::OggVorbis),
            _ => None,
        }
    }

    /// True when a file already in this container needs no transcode
    /// to be served as this format.
    pub fn compatible_with_suffix(self, suffix: &str) -> bool {
        matches!(
            (self, suffix),
            (Self::Mp3, "mp3") | (Self::OggOpus, "opus") | (Self::OggVorbis, "ogg" | "oga")
        )
    }

    pub fn container_mime(self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::OggOpus | Self::OggVorbis => "audio/ogg",
            Self::MatroskaOpus => "audio/x-matroska",
            Self::WebmVorbis => "audio/webm",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::OggOpus | Self::OggVorbis => "ogg",
            Self::MatroskaOpus => "mka",
            Self::WebmVorbis => "webm",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscodeSpec {
    pub format: OutputFormat,
    /// Target bitrate in bits/sec.
    pub bitrate: u32,
    /// `false` for streaming: clients should see the original tags for
    /// offline use and replay gain.
    pub strip_metadata: bool,
}

#[derive(Debug, Clone)]
pub enum StreamPlan {
    File,
    Transcode(TranscodeSpec),
}

fn file_suffix(path: &str) -> String {
    std::path::Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// The lower bound a clamped bitrate is never allowed to go below,
/// so a tiny `maxBitRate` request can't force near-silent output.
const MIN_TRANSCODE_BITRATE_KBPS: u32 = 48;

/// Picks between serving the original file and transcoding, in five steps.
pub fn choose(track: &Track, user: &User, format_param: Option<&str>, max_bitrate_kbps: Option<u32>) -> StreamPlan {
    // 1. format=="raw" => always the original file.
    if format_param == Some("raw") {
        return StreamPlan::File;
    }

    // 2. requested = parsed format, else the user's default if enabled.
    let requested = format_param
        .and_then(OutputFormat::parse)
        .or_else(|| {
            if user.transcoding_enable_by_default {
                user.transcoding_default_format.as_deref().and_then(OutputFormat::parse)
            } else {
                None
            }
        });

    let within_max_bitrate = |track_bitrate_kbps: Option<u32>| match (max_bitrate_kbps, track_bitrate_kbps) {
        (None, _) | (Some(0), _) => true,
        (Some(max), Some(actual)) => actual <= max,
        (Some(_), None) => false,
    };

    // 3. No requested format and within the caller's bitrate ceiling => file.
    if requested.is_none() && within_max_bitrate(track.bitrate) {
        return StreamPlan::File;
    }

    let suffix = file_suffix(&track.absolute_file_path);

    // 4. Requested format already matches the input container and the
    // file's own bitrate already satisfies maxBitRate => file.
    if let Some(requested) = requested {
        if requested.compatible_with_suffix(&suffix) && within_max_bitrate(track.bitrate) {
            return StreamPlan::File;
        }
    }

    // 5. Otherwise transcode.
    let format = requested.unwrap_or(OutputFormat::OggOpus);
    let default_bitrate_kbps = user.transcoding_default_bitrate.map(|b| b / 1000).unwrap_or(128);
    let bitrate_kbps = match max_bitrate_kbps {
        Some(0) | None => default_bitrate_kbps,
        Some(max) => default_bitrate_kbps.clamp(MIN_TRANSCODE_BITRATE_KBPS, max.max(MIN_TRANSCODE_BITRATE_KBPS)).min(max),
    };

    StreamPlan::Transcode(TranscodeSpec {
        format,
        bitrate: bitrate_kbps * 1000,
        strip_metadata: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Advisory, UserType};
    use crate::ids::{TrackId, UserId};
    use crate::primitives::PartialDateTime;

    fn track(path: &str, bitrate: Option<u32>) -> Track {
        Track {
            id: TrackId::new(1),
            absolute_file_path: path.to_string(),
            file_size: 0,
            last_write_time: PartialDateTime::invalid(),
            added_time: PartialDateTime::invalid(),
            scan_version: 0,
            duration_ms: 180_000,
            bitrate,
            sample_rate: None,
            bits_per_sample: None,
            channels: None,
            name: "Song".to_string(),
            track_number: None,
            disc_number: None,
            date: PartialDateTime::invalid(),
            original_date: PartialDateTime::invalid(),
            track_mbid: None,
            recording_mbid: None,
            copyright: None,
            copyright_url: None,
            advisory: Advisory::Unset,
            comment: None,
            track_replay_gain: None,
            release_replay_gain: None,
            artist_display_name: None,
            release_id: None,
            medium_id: None,
            directory_id: None,
            media_library_id: None,
            preferred_artwork_id: None,
            preferred_media_artwork_id: None,
        }
    }

    fn user(enable_by_default: bool, default_format: Option<&str>, default_bitrate: Option<u32>) -> User {
        User {
            id: UserId::new(1),
            name: "alice".to_string(),
            user_type: UserType::Regular,
            transcoding_enable_by_default: enable_by_default,
            transcoding_default_format: default_format.map(str::to_string),
            transcoding_default_bitrate: default_bitrate,
            transcoding_max_bitrate: None,
            created_at: PartialDateTime::invalid(),
            last_login: None,
        }
    }

    #[test]
    fn raw_format_always_serves_the_file() {
        let t = track("/music/song.flac", Some(900));
        let u = user(true, Some("mp3"), Some(192_000));
        assert!(matches!(choose(&t, &u, Some("raw"), Some(64)), StreamPlan::File));
    }

    #[test]
    fn no_requested_format_within_bitrate_ceiling_serves_the_file() {
        let t = track("/music/song.mp3", Some(192));
        let u = user(false, None, None);
        assert!(matches!(choose(&t, &u, None, Some(0)), StreamPlan::File));
        assert!(matches!(choose(&t, &u, None, Some(256)), StreamPlan::File));
    }

    #[test]
    fn exceeding_max_bitrate_transcodes_to_mp3_at_the_cap() {
        let t = track("/music/song.mp3", Some(192));
        let u = user(true, Some("mp3"), Some(192_000));
        match choose(&t, &u, None, Some(128)) {
            StreamPlan::Transcode(spec) => {
                assert_eq!(spec.format, OutputFormat::Mp3);
                assert_eq!(spec.bitrate, 128_000);
                assert!(!spec.strip_metadata);
            }
            StreamPlan::File => panic!("expected a transcode"),
        }
    }

    #[test]
    fn flac_input_opus_request_transcodes_at_user_default() {
        let t = track("/music/song.flac", Some(900));
        let u = user(false, None, Some(128_000));
        match choose(&t, &u, Some("opus"), Some(0)) {
            StreamPlan::Transcode(spec) => {
                assert_eq!(spec.format, OutputFormat::OggOpus);
                assert_eq!(spec.bitrate, 128_000);
            }
            StreamPlan::File => panic!("expected a transcode"),
        }
    }

    #[test]
    fn compatible_container_under_the_cap_serves_the_file() {
        let t = track("/music/song.mp3", Some(128));
        let u = user(false, None, None);
        assert!(matches!(choose(&t, &u, Some("mp3"), Some(0)), StreamPlan::File));
    }
}
