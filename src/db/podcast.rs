//! Podcast episode finders. Podcasts are out of scope for the scanner
//! itself; this only models the Subsonic-visible rows.

use sqlx::Row;

use crate::ids::PodcastEpisodeId;
use crate::primitives::PartialDateTime;

use super::error::{Error, Result};
use super::models::{PodcastEpisode, PodcastEpisodeState};
use super::pool::{Executor, WriteCapable};

fn parse_state(s: &str) -> PodcastEpisodeState {
    match s {
        "downloading" => PodcastEpisodeState::Downloading,
        "completed" => PodcastEpisodeState::Completed,
        "error" => PodcastEpisodeState::Error,
        _ => PodcastEpisodeState::NotDownloaded,
    }
}

fn state_str(s: PodcastEpisodeState) -> &'static str {
    match s {
        PodcastEpisodeState::NotDownloaded => "not_downloaded",
        PodcastEpisodeState::Downloading => "downloading",
        PodcastEpisodeState::Completed => "completed",
        PodcastEpisodeState::Error => "error",
    }
}

pub async fn find_all(tx: &mut impl Executor) -> Result<Vec<PodcastEpisode>> {
    let rows = sqlx::query("SELECT * FROM podcast_episode ORDER BY published_at DESC")
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|row| PodcastEpisode {
            id: PodcastEpisodeId::new(row.get::<i64, _>("id")),
            title: row.get("title"),
            state: parse_state(row.get::<String, _>("state").as_str()),
            absolute_file_path: row.get("absolute_file_path"),
            published_at: row
                .get::<Option<String>, _>("published_at")
                .map(|s| PartialDateTime::from_str(&s)),
        })
        .collect())
}

pub async fn set_state(
    tx: &mut (impl Executor + WriteCapable),
    id: PodcastEpisodeId,
    state: PodcastEpisodeState,
) -> Result<()> {
    sqlx::query("UPDATE podcast_episode SET state = ? WHERE id = ?")
        .bind(state_str(state))
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}
