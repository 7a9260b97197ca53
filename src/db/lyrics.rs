//! TrackLyrics finders, over the rows lyrics parsing feeds into the store.

use sqlx::Row;

use crate::ids::{TrackId, TrackLyricsId};

use super::error::{Error, Result};
use super::models::{LyricsContent, SyncedLyricsLine, TrackLyrics};
use super::pool::{Executor, WriteCapable};

fn encode_content(content: &LyricsContent) -> (i64, String) {
    match content {
        LyricsContent::Unsynchronized(text) => (0, text.clone()),
        LyricsContent::Synchronized(lines) => {
            let encoded = lines
                .iter()
                .map(|l| serde_json::json!({"offset_ms": l.offset_ms, "text": l.text}))
                .collect::<Vec<_>>();
            (1, serde_json::Value::Array(encoded).to_string())
        }
    }
}

fn decode_content(synchronized: bool, json: &str) -> LyricsContent {
    if !synchronized {
        return LyricsContent::Unsynchronized(json.to_string());
    }
    let lines: Vec<SyncedLyricsLine> = serde_json::from_str::<Vec<serde_json::Value>>(json)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| {
            Some(SyncedLyricsLine {
                offset_ms: v.get("offset_ms")?.as_i64()?,
                text: v.get("text")?.as_str()?.to_string(),
            })
        })
        .collect();
    LyricsContent::Synchronized(lines)
}

pub async fn find_for_track(tx: &mut impl Executor, track_id: TrackId) -> Result<Vec<TrackLyrics>> {
    let rows = sqlx::query("SELECT * FROM track_lyrics WHERE track_id = ?")
        .bind(track_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|row| TrackLyrics {
            id: TrackLyricsId::new(row.get::<i64, _>("id")),
            track_id: Some(track_id),
            embedded: row.get::<i64, _>("embedded") != 0,
            external_path: row.get("external_path"),
            language: row.get("language"),
            offset_ms: row.get::<Option<i64>, _>("offset_ms").unwrap_or(0),
            display_artist: row.get("display_artist"),
            display_title: row.get("display_title"),
            content: decode_content(
                row.get::<i64, _>("synchronized") != 0,
                row.get::<String, _>("content_json").as_str(),
            ),
        })
        .collect())
}

pub async fn replace_for_track(
    tx: &mut (impl Executor + WriteCapable),
    track_id: TrackId,
    lyrics: &[(bool, Option<String>, Option<String>, i64, LyricsContent)],
) -> Result<()> {
    sqlx::query("DELETE FROM track_lyrics WHERE track_id = ?")
        .bind(track_id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;

    for (embedded, external_path, language, offset_ms, content) in lyrics {
        let (synchronized, content_json) = encode_content(content);
        sqlx::query(
            "INSERT INTO track_lyrics \
             (track_id, embedded, external_path, language, offset_ms, synchronized, content_json) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(track_id.value())
        .bind(*embedded as i64)
        .bind(external_path)
        .bind(language)
        .bind(offset_ms)
        .bind(synchronized)
        .bind(content_json)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::SessionPool;
    use crate::db::track::{self, ParsedTrack};
    use crate::primitives::PartialDateTime;

    async fn sample_track(tx: &mut super::super::pool::WriteTransaction) -> TrackId {
        track::upsert(
            tx,
            &ParsedTrack {
                absolute_file_path: "/music/a.flac".into(),
                file_size: 10,
                last_write_time: PartialDateTime::from_str("2024"),
                is_first_scan: false,
                scan_version: 1,
                duration_ms: 1000,
                bitrate: None,
                sample_rate: None,
                bits_per_sample: None,
                channels: None,
                name: "A".into(),
                track_number: None,
                disc_number: None,
                date: PartialDateTime::invalid(),
                original_date: PartialDateTime::invalid(),
                track_mbid: None,
                recording_mbid: None,
                copyright: None,
                copyright_url: None,
                advisory: super::super::models::Advisory::Unset,
                comment: None,
                track_replay_gain: None,
                release_replay_gain: None,
                artist_display_name: None,
                release_id: None,
                medium_id: None,
                directory_id: None,
                media_library_id: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn synchronized_lyrics_roundtrip() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        let track_id = sample_track(&mut tx).await;

        let content = LyricsContent::Synchronized(vec![SyncedLyricsLine {
            offset_ms: 1200,
            text: "first line".into(),
        }]);
        replace_for_track(&mut tx, track_id, &[(true, None, Some("en".into()), 0, content)])
            .await
            .unwrap();

        let rows = find_for_track(&mut tx, track_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_synchronized());
    }
}
