//! Pure audio tag and audio-properties parsing.
//!
//! Tag extraction is split behind a `TagReader` trait, one
//! implementation per container. Audio properties (duration,
//! bitrate, sample rate) come from `symphonia`'s format probe rather
//! than from the tag container, since VBR files lie about bitrate in
//! their headers.

use std::path::Path;

use id3::TagLike;

use super::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedImageTag {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub picture_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedLyricsTag {
    pub language: Option<String>,
    pub description: Option<String>,
    /// `None` for unsynchronized lyrics; `Some` gives `(offset_ms,
    /// text)` pairs for a SYLT/synchronized frame.
    pub synchronized_lines: Option<Vec<(u32, String)>>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTags {
    pub title: Option<String>,
    pub artists: Vec<String>,
    pub artist_sort: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub date: Option<String>,
    pub original_date: Option<String>,
    pub genres: Vec<String>,
    pub comment: Option<String>,
    pub copyright: Option<String>,
    pub musicbrainz_track_id: Option<String>,
    pub musicbrainz_recording_id: Option<String>,
    pub musicbrainz_release_id: Option<String>,
    pub musicbrainz_release_group_id: Option<String>,
    pub musicbrainz_artist_id: Option<String>,
    pub compilation: bool,
    pub replay_gain_track: Option<f64>,
    pub replay_gain_album: Option<f64>,
    pub embedded_images: Vec<EmbeddedImageTag>,
    pub embedded_lyrics: Vec<EmbeddedLyricsTag>,
}

pub trait TagReader {
    fn read_tags(&self, path: &Path) -> Result<ParsedTags>;
}

pub struct Mp3TagReader;

impl TagReader for Mp3TagReader {
    fn read_tags(&self, path: &Path) -> Result<ParsedTags> {
        let tag = id3::Tag::read_from_path(path).map_err(|e| Error::Tag {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut parsed = ParsedTags {
            title: tag.title().map(str::to_string),
            album: tag.album().map(str::to_string),
            album_artist: tag.album_artist().map(str::to_string),
            track_number: tag.track(),
            disc_number: tag.disc(),
            date: tag.date_recorded().map(|d| d.to_string()),
            original_date: tag.original_date_released().map(|d| d.to_string()),
            genres: tag.genre().map(|g| vec![g.to_string()]).unwrap_or_default(),
            comment: tag.comments().next().map(|c| c.text.clone()),
            ..Default::default()
        };
        if let Some(artist) = tag.artist() {
            parsed.artists.push(artist.to_string());
        }
        for picture in tag.pictures() {
            parsed.embedded_images.push(EmbeddedImageTag {
                data: picture.data.clone(),
                mime_type: picture.mime_type.clone(),
                picture_type: format!("{:?}", picture.picture_type),
                description: picture.description.clone(),
            });
        }
        for lyrics in tag.lyrics() {
            parsed.embedded_lyrics.push(EmbeddedLyricsTag {
                language: Some(lyrics.lang.clone()),
                description: Some(lyrics.description.clone()),
                synchronized_lines: None,
                text: lyrics.text.clone(),
            });
        }
        for synced in tag.synchronised_lyrics() {
            let lines = synced
                .content
                .iter()
                .map(|(ts, text)| (*ts, text.clone()))
                .collect();
            parsed.embedded_lyrics.push(EmbeddedLyricsTag {
                language: Some(synced.lang.clone()),
                description: Some(synced.description.clone()),
                synchronized_lines: Some(lines),
                text: String::new(),
            });
        }
        Ok(parsed)
    }
}

pub struct FlacTagReader;

impl TagReader for FlacTagReader {
    fn read_tags(&self, path: &Path) -> Result<ParsedTags> {
        let tag = metaflac::Tag::read_from_path(path).map_err(|e| Error::Tag {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let comments = tag.vorbis_comments();
        let first = |key: &str| -> Option<String> {
            comments.and_then(|c| c.get(key)).and_then(|v| v.first()).cloned()
        };
        let all = |key: &str| -> Vec<String> {
            comments.and_then(|c| c.get(key)).cloned().unwrap_or_default()
        };

        let mut parsed = ParsedTags {
            title: first("TITLE"),
            artists: all("ARTIST"),
            artist_sort: first("ARTISTSORT"),
            album: first("ALBUM"),
            album_artist: first("ALBUMARTIST"),
            track_number: first("TRACKNUMBER").and_then(|s| s.parse().ok()),
            disc_number: first("DISCNUMBER").and_then(|s| s.parse().ok()),
            date: first("DATE"),
            original_date: first("ORIGINALDATE"),
            genres: all("GENRE"),
            comment: first("COMMENT"),
            copyright: first("COPYRIGHT"),
            musicbrainz_track_id: first("MUSICBRAINZ_RELEASETRACKID"),
            musicbrainz_recording_id: first("MUSICBRAINZ_TRACKID"),
            musicbrainz_release_id: first("MUSICBRAINZ_ALBUMID"),
            musicbrainz_release_group_id: first("MUSICBRAINZ_RELEASEGROUPID"),
            musicbrainz_artist_id: first("MUSICBRAINZ_ARTISTID"),
            compilation: first("COMPILATION").map(|v| v == "1").unwrap_or(false),
            replay_gain_track: first("REPLAYGAIN_TRACK_GAIN")
                .and_then(|s| s.trim_end_matches(" dB").parse().ok()),
            replay_gain_album: first("REPLAYGAIN_ALBUM_GAIN")
                .and_then(|s| s.trim_end_matches(" dB").parse().ok()),
            ..Default::default()
        };

        for picture in tag.pictures() {
            parsed.embedded_images.push(EmbeddedImageTag {
                data: picture.data.clone(),
                mime_type: picture.mime_type.clone(),
                picture_type: format!("{:?}", picture.picture_type),
                description: picture.description.clone(),
            });
        }

        if let Some(lyrics) = first("LYRICS").or_else(|| first("UNSYNCEDLYRICS")) {
            parsed.embedded_lyrics.push(EmbeddedLyricsTag {
                language: None,
                description: None,
                synchronized_lines: None,
                text: lyrics,
            });
        }

        Ok(parsed)
    }
}

/// Picks a tag reader by the file's lowercased extension; `None` for
/// containers this server doesn't understand, which the scanner treats
/// as a skip rather than a hard error.
pub fn reader_for_extension(extension: &str) -> Option<Box<dyn TagReader>> {
    match extension.to_ascii_lowercase().as_str() {
        "mp3" => Some(Box::new(Mp3TagReader)),
        "flac" => Some(Box::new(FlacTagReader)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioProperties {
    pub duration_ms: u64,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub bits_per_sample: Option<u32>,
    pub channels: Option<u32>,
}

/// Probes a file's container/codec to compute true playback duration
/// and bitrate, independent of whatever the tag frames claim.
pub fn probe_audio_properties(path: &Path) -> Result<AudioProperties> {
    let file = std::fs::File::open(path).map_err(|e| Error::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    let mss = symphonia::core::io::MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = symphonia::core::probe::Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &Default::default(),
            &symphonia::core::meta::MetadataOptions::default(),
        )
        .map_err(|_| Error::NoAudioProperties {
            path: path.display().to_string(),
        })?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| Error::NoAudioProperties {
            path: path.display().to_string(),
        })?;

    let params = &track.codec_params;
    let sample_rate = params.sample_rate;
    let channels = params.channels.map(|c| c.count() as u32);
    let bits_per_sample = params.bits_per_sample;

    let duration_ms = match (params.n_frames, sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => frames * 1000 / rate as u64,
        _ => 0,
    };

    let bitrate = if duration_ms > 0 {
        std::fs::metadata(path)
            .ok()
            .map(|m| ((m.len() * 8) / (duration_ms.max(1) / 1000).max(1)) as u32 / 1000)
    } else {
        None
    };

    Ok(AudioProperties {
        duration_ms,
        bitrate,
        sample_rate,
        bits_per_sample,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_for_extension_is_case_insensitive() {
        assert!(reader_for_extension("MP3").is_some());
        assert!(reader_for_extension("flac").is_some());
        assert!(reader_for_extension("wav").is_none());
    }
}
