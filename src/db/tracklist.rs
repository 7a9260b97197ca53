//! Playlist (TrackList) and PlayQueue finders.

use sqlx::Row;

use crate::ids::{TrackId, TrackListEntryId, TrackListId, UserId};
use crate::primitives::PartialDateTime;

use super::error::{Error, Result};
use super::models::{
    PlayQueue, PlayQueueEntry, TrackList, TrackListEntry, TrackListType, TrackListVisibility,
};
use super::pool::{Executor, WriteCapable};

fn row_to_tracklist(row: &sqlx::sqlite::SqliteRow) -> TrackList {
    TrackList {
        id: TrackListId::new(row.get::<i64, _>("id")),
        name: row.get("name"),
        list_type: if row.get::<String, _>("list_type") == "internal" {
            TrackListType::Internal
        } else {
            TrackListType::Playlist
        },
        visibility: if row.get::<String, _>("visibility") == "public" {
            TrackListVisibility::Public
        } else {
            TrackListVisibility::Private
        },
        user_id: UserId::new(row.get::<i64, _>("user_id")),
        last_modified: PartialDateTime::from_str(row.get::<String, _>("last_modified").as_str()),
    }
}

pub async fn find_by_id(tx: &mut impl Executor, id: TrackListId) -> Result<TrackList> {
    let row = sqlx::query("SELECT * FROM track_list WHERE id = ?")
        .bind(id.value())
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
        .ok_or(Error::ObjectNotFound)?;
    Ok(row_to_tracklist(&row))
}

pub async fn find_for_user(tx: &mut impl Executor, user_id: UserId) -> Result<Vec<TrackList>> {
    let rows = sqlx::query("SELECT * FROM track_list WHERE user_id = ? ORDER BY name COLLATE NOCASE")
        .bind(user_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(row_to_tracklist).collect())
}

pub async fn create(
    tx: &mut (impl Executor + WriteCapable),
    name: &str,
    list_type: TrackListType,
    visibility: TrackListVisibility,
    user_id: UserId,
) -> Result<TrackListId> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName("playlist name must not be empty".into()));
    }
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let result = sqlx::query(
        "INSERT INTO track_list (name, list_type, visibility, user_id, last_modified) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(name)
    .bind(if list_type == TrackListType::Internal { "internal" } else { "playlist" })
    .bind(if visibility == TrackListVisibility::Public { "public" } else { "private" })
    .bind(user_id.value())
    .bind(now)
    .execute(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(TrackListId::new(result.last_insert_rowid()))
}

pub async fn delete(tx: &mut (impl Executor + WriteCapable), id: TrackListId) -> Result<()> {
    sqlx::query("DELETE FROM track_list WHERE id = ?")
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

pub async fn find_entries(tx: &mut impl Executor, track_list_id: TrackListId) -> Result<Vec<TrackListEntry>> {
    let rows = sqlx::query("SELECT * FROM track_list_entry WHERE track_list_id = ? ORDER BY id")
        .bind(track_list_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .enumerate()
        .map(|(position, row)| TrackListEntry {
            id: TrackListEntryId::new(row.get::<i64, _>("id")),
            track_list_id,
            track_id: TrackId::new(row.get::<i64, _>("track_id")),
            position: position as i64,
        })
        .collect())
}

/// Appends tracks to the end of a playlist, in order (used by
/// `createPlaylist`/`updatePlaylist` with `songIdToAdd`).
pub async fn append_entries(
    tx: &mut (impl Executor + WriteCapable),
    track_list_id: TrackListId,
    track_ids: &[TrackId],
) -> Result<()> {
    for track_id in track_ids {
        sqlx::query("INSERT INTO track_list_entry (track_list_id, track_id) VALUES (?, ?)")
            .bind(track_list_id.value())
            .bind(track_id.value())
            .execute(tx.connection())
            .await
            .map_err(Error::from_sqlx)?;
    }
    touch(tx, track_list_id).await
}

/// Removes entries by their 0-based position, per `updatePlaylist`'s
/// `songIndexToRemove`.
pub async fn remove_entries_at(
    tx: &mut (impl Executor + WriteCapable),
    track_list_id: TrackListId,
    positions: &[i64],
) -> Result<()> {
    let entries = find_entries(tx, track_list_id).await?;
    for &position in positions {
        if let Some(entry) = entries.iter().find(|e| e.position == position) {
            sqlx::query("DELETE FROM track_list_entry WHERE id = ?")
                .bind(entry.id.value())
                .execute(tx.connection())
                .await
                .map_err(Error::from_sqlx)?;
        }
    }
    touch(tx, track_list_id).await
}

async fn touch(tx: &mut (impl Executor + WriteCapable), id: TrackListId) -> Result<()> {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    sqlx::query("UPDATE track_list SET last_modified = ? WHERE id = ?")
        .bind(now)
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

pub async fn find_play_queue(
    tx: &mut impl Executor,
    user_id: UserId,
    client_name: &str,
) -> Result<Option<PlayQueue>> {
    let row = sqlx::query("SELECT * FROM play_queue WHERE user_id = ? AND client_name = ?")
        .bind(user_id.value())
        .bind(client_name)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    let Some(row) = row else { return Ok(None) };
    let play_queue_id: i64 = row.get("id");
    let entry_rows = sqlx::query("SELECT * FROM play_queue_entry WHERE play_queue_id = ? ORDER BY position")
        .bind(play_queue_id)
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(Some(PlayQueue {
        user_id,
        client_name: client_name.to_string(),
        current_index: row.get("current_index"),
        current_position_ms: row.get("current_position_ms"),
        entries: entry_rows
            .iter()
            .map(|e| PlayQueueEntry {
                track_id: TrackId::new(e.get::<i64, _>("track_id")),
                position: e.get("position"),
            })
            .collect(),
    }))
}

/// Replaces a client's play queue wholesale, which is how Subsonic's
/// `savePlayQueue` always behaves.
pub async fn save_play_queue(
    tx: &mut (impl Executor + WriteCapable),
    user_id: UserId,
    client_name: &str,
    current_index: Option<i64>,
    current_position_ms: i64,
    track_ids: &[TrackId],
) -> Result<()> {
    let existing = sqlx::query("SELECT id FROM play_queue WHERE user_id = ? AND client_name = ?")
        .bind(user_id.value())
        .bind(client_name)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;

    let play_queue_id: i64 = if let Some(row) = existing {
        let id: i64 = row.get("id");
        sqlx::query(
            "UPDATE play_queue SET current_index = ?, current_position_ms = ? WHERE id = ?",
        )
        .bind(current_index)
        .bind(current_position_ms)
        .bind(id)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
        sqlx::query("DELETE FROM play_queue_entry WHERE play_queue_id = ?")
            .bind(id)
            .execute(tx.connection())
            .await
            .map_err(Error::from_sqlx)?;
        id
    } else {
        let result = sqlx::query(
            "INSERT INTO play_queue (user_id, client_name, current_index, current_position_ms) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id.value())
        .bind(client_name)
        .bind(current_index)
        .bind(current_position_ms)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
        result.last_insert_rowid()
    };

    for (position, track_id) in track_ids.iter().enumerate() {
        sqlx::query("INSERT INTO play_queue_entry (play_queue_id, track_id, position) VALUES (?, ?, ?)")
            .bind(play_queue_id)
            .bind(track_id.value())
            .bind(position as i64)
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

    #[tokio::test]
    async fn appended_entries_come_back_in_order() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();

        sqlx::query("INSERT INTO user (id, name, created_at) VALUES (1, 'alice', '2024-01-01')")
            .execute(tx.connection())
            .await
            .unwrap();
        let list_id = create(&mut tx, "Favorites", TrackListType::Playlist, TrackListVisibility::Private, UserId::new(1))
            .await
            .unwrap();

        sqlx::query("INSERT INTO track (id, absolute_file_path, file_size, last_write_time, added_time, scan_version, duration_ms, name, advisory) VALUES (1, '/a', 0, '2024', '2024', 1, 0, 'A', 'unset')")
            .execute(tx.connection())
            .await
            .unwrap();
        append_entries(&mut tx, list_id, &[TrackId::new(1)]).await.unwrap();

        let entries = find_entries(&mut tx, list_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].track_id, TrackId::new(1));
    }
}
