//! User accounts, bookmarks, listens and starred entities.

use sqlx::Row;

use crate::ids::{ArtistId, ListenId, ReleaseId, TrackBookmarkId, TrackId, UserId};
use crate::primitives::PartialDateTime;

use super::error::{Error, Result};
use super::models::{Listen, SyncState, TrackBookmark, User, UserType};
use super::pool::{Executor, WriteCapable};

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: UserId::new(row.get::<i64, _>("id")),
        name: row.get("name"),
        user_type: UserType::parse(row.get::<String, _>("user_type").as_str()),
        transcoding_enable_by_default: row.get::<i64, _>("transcoding_enable_by_default") != 0,
        transcoding_default_format: row.get("transcoding_default_format"),
        transcoding_default_bitrate: row.get::<Option<i64>, _>("transcoding_default_bitrate").map(|v| v as u32),
        transcoding_max_bitrate: row.get::<Option<i64>, _>("transcoding_max_bitrate").map(|v| v as u32),
        created_at: PartialDateTime::from_str(row.get::<String, _>("created_at").as_str()),
        last_login: row
            .get::<Option<String>, _>("last_login")
            .map(|s| PartialDateTime::from_str(&s)),
    }
}

pub async fn find_by_id(tx: &mut impl Executor, id: UserId) -> Result<User> {
    let row = sqlx::query("SELECT * FROM user WHERE id = ?")
        .bind(id.value())
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
        .ok_or(Error::ObjectNotFound)?;
    Ok(row_to_user(&row))
}

pub async fn find_by_name(tx: &mut impl Executor, name: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT * FROM user WHERE name = ?")
        .bind(name)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(row.as_ref().map(row_to_user))
}

pub async fn find_all(tx: &mut impl Executor) -> Result<Vec<User>> {
    let rows = sqlx::query("SELECT * FROM user ORDER BY name COLLATE NOCASE")
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(row_to_user).collect())
}

pub async fn create(
    tx: &mut (impl Executor + WriteCapable),
    name: &str,
    user_type: UserType,
) -> Result<UserId> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName("user name must not be empty".into()));
    }
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let result = sqlx::query("INSERT INTO user (name, user_type, created_at) VALUES (?, ?, ?)")
        .bind(name)
        .bind(user_type.as_str())
        .bind(now)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(UserId::new(result.last_insert_rowid()))
}

pub async fn delete(tx: &mut (impl Executor + WriteCapable), id: UserId) -> Result<()> {
    sqlx::query("DELETE FROM user WHERE id = ?")
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

/// Updates the mutable fields `updateUser` is allowed to touch. Admin
/// user CRUD only; no password backend is wired up here.
pub async fn update(
    tx: &mut (impl Executor + WriteCapable),
    id: UserId,
    user_type: Option<UserType>,
    transcoding_max_bitrate: Option<Option<u32>>,
) -> Result<()> {
    if let Some(user_type) = user_type {
        sqlx::query("UPDATE user SET user_type = ? WHERE id = ?")
            .bind(user_type.as_str())
            .bind(id.value())
            .execute(tx.connection())
            .await
            .map_err(Error::from_sqlx)?;
    }
    if let Some(max_bitrate) = transcoding_max_bitrate {
        sqlx::query("UPDATE user SET transcoding_max_bitrate = ? WHERE id = ?")
            .bind(max_bitrate.map(|v| v as i64))
            .bind(id.value())
            .execute(tx.connection())
            .await
            .map_err(Error::from_sqlx)?;
    }
    Ok(())
}

pub async fn record_login(tx: &mut (impl Executor + WriteCapable), id: UserId) -> Result<()> {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    sqlx::query("UPDATE user SET last_login = ? WHERE id = ?")
        .bind(now)
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

pub async fn create_bookmark(
    tx: &mut (impl Executor + WriteCapable),
    user_id: UserId,
    track_id: TrackId,
    position_ms: i64,
    comment: Option<&str>,
) -> Result<TrackBookmarkId> {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let result = sqlx::query(
        "INSERT INTO track_bookmark (user_id, track_id, position_ms, comment, created_at, changed_at) \
         VALUES (?, ?, ?, ?, ?, ?) \
         ON CONFLICT(user_id, track_id) DO UPDATE SET \
         position_ms = excluded.position_ms, comment = excluded.comment, changed_at = excluded.changed_at",
    )
    .bind(user_id.value())
    .bind(track_id.value())
    .bind(position_ms)
    .bind(comment)
    .bind(&now)
    .bind(&now)
    .execute(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;

    if result.rows_affected() > 0 {
        if let Some(row) = sqlx::query("SELECT id FROM track_bookmark WHERE user_id = ? AND track_id = ?")
            .bind(user_id.value())
            .bind(track_id.value())
            .fetch_optional(tx.connection())
            .await
            .map_err(Error::from_sqlx)?
        {
            return Ok(TrackBookmarkId::new(row.get::<i64, _>("id")));
        }
    }
    Err(Error::ObjectNotFound)
}

pub async fn delete_bookmark(
    tx: &mut (impl Executor + WriteCapable),
    user_id: UserId,
    track_id: TrackId,
) -> Result<()> {
    sqlx::query("DELETE FROM track_bookmark WHERE user_id = ? AND track_id = ?")
        .bind(user_id.value())
        .bind(track_id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

pub async fn find_bookmarks_for_user(tx: &mut impl Executor, user_id: UserId) -> Result<Vec<TrackBookmark>> {
    let rows = sqlx::query("SELECT * FROM track_bookmark WHERE user_id = ?")
        .bind(user_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|row| TrackBookmark {
            id: TrackBookmarkId::new(row.get::<i64, _>("id")),
            user_id,
            track_id: TrackId::new(row.get::<i64, _>("track_id")),
            position_ms: row.get("position_ms"),
            comment: row.get("comment"),
            created_at: PartialDateTime::from_str(row.get::<String, _>("created_at").as_str()),
            changed_at: PartialDateTime::from_str(row.get::<String, _>("changed_at").as_str()),
        })
        .collect())
}

pub async fn record_listen(
    tx: &mut (impl Executor + WriteCapable),
    user_id: UserId,
    track_id: TrackId,
) -> Result<ListenId> {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let result = sqlx::query("INSERT INTO listen (user_id, track_id, listened_at) VALUES (?, ?, ?)")
        .bind(user_id.value())
        .bind(track_id.value())
        .bind(now)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(ListenId::new(result.last_insert_rowid()))
}

pub async fn find_listens_for_user(tx: &mut impl Executor, user_id: UserId) -> Result<Vec<Listen>> {
    let rows = sqlx::query("SELECT * FROM listen WHERE user_id = ? ORDER BY listened_at DESC")
        .bind(user_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|row| Listen {
            id: ListenId::new(row.get::<i64, _>("id")),
            user_id,
            track_id: TrackId::new(row.get::<i64, _>("track_id")),
            listened_at: PartialDateTime::from_str(row.get::<String, _>("listened_at").as_str()),
        })
        .collect())
}

macro_rules! starred_table {
    ($star_fn:ident, $unstar_fn:ident, $find_fn:ident, $table:literal, $entity_column:literal, $EntityId:ty) => {
        pub async fn $star_fn(
            tx: &mut (impl Executor + WriteCapable),
            user_id: UserId,
            entity_id: $EntityId,
        ) -> Result<()> {
            let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
            let sql = format!(
                "INSERT OR REPLACE INTO {} (user_id, {}, starred_date_time, sync_state) VALUES (?, ?, ?, 'synchronized')",
                $table, $entity_column
            );
            sqlx::query(&sql)
                .bind(user_id.value())
                .bind(entity_id.value())
                .bind(now)
                .execute(tx.connection())
                .await
                .map_err(Error::from_sqlx)?;
            Ok(())
        }

        pub async fn $unstar_fn(
            tx: &mut (impl Executor + WriteCapable),
            user_id: UserId,
            entity_id: $EntityId,
        ) -> Result<()> {
            let sql = format!("DELETE FROM {} WHERE user_id = ? AND {} = ?", $table, $entity_column);
            sqlx::query(&sql)
                .bind(user_id.value())
                .bind(entity_id.value())
                .execute(tx.connection())
                .await
                .map_err(Error::from_sqlx)?;
            Ok(())
        }

        pub async fn $find_fn(
            tx: &mut impl Executor,
            user_id: UserId,
        ) -> Result<Vec<($EntityId, PartialDateTime, SyncState)>> {
            let sql = format!(
                "SELECT {}, starred_date_time, sync_state FROM {} WHERE user_id = ?",
                $entity_column, $table
            );
            let rows = sqlx::query(&sql)
                .bind(user_id.value())
                .fetch_all(tx.connection())
                .await
                .map_err(Error::from_sqlx)?;
            Ok(rows
                .iter()
                .map(|row| {
                    (
                        <$EntityId>::new(row.get::<i64, _>(0)),
                        PartialDateTime::from_str(row.get::<String, _>(1).as_str()),
                        SyncState::parse(row.get::<String, _>(2).as_str()),
                    )
                })
                .collect())
        }
    };
}

starred_table!(star_artist, unstar_artist, find_starred_artists, "starred_artist", "artist_id", ArtistId);
starred_table!(star_release, unstar_release, find_starred_releases, "starred_release", "release_id", ReleaseId);
starred_table!(star_track, unstar_track, find_starred_tracks, "starred_track", "track_id", TrackId);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::SessionPool;

    #[tokio::test]
    async fn starring_then_unstarring_a_track_clears_it() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        let user_id = create(&mut tx, "alice", UserType::Regular).await.unwrap();
        sqlx::query("INSERT INTO track (id, absolute_file_path, file_size, last_write_time, added_time, scan_version, duration_ms, name, advisory) VALUES (1, '/a', 0, '2024', '2024', 1, 0, 'A', 'unset')")
            .execute(tx.connection())
            .await
            .unwrap();

        star_track(&mut tx, user_id, TrackId::new(1)).await.unwrap();
        assert_eq!(find_starred_tracks(&mut tx, user_id).await.unwrap().len(), 1);
        unstar_track(&mut tx, user_id, TrackId::new(1)).await.unwrap();
        assert!(find_starred_tracks(&mut tx, user_id).await.unwrap().is_empty());
    }
}
