//! Directory tree and media library finders.

use sqlx::Row;

use crate::ids::{DirectoryId, MediaLibraryId};

use super::error::{Error, Result};
use super::models::{Directory, MediaLibrary};
use super::pool::{Executor, WriteCapable};

fn row_to_directory(row: &sqlx::sqlite::SqliteRow) -> Directory {
    Directory {
        id: DirectoryId::new(row.get::<i64, _>("id")),
        path: row.get("path"),
        parent_directory_id: row.get::<Option<i64>, _>("parent_directory_id").map(DirectoryId::new),
        media_library_id: row.get::<Option<i64>, _>("media_library_id").map(MediaLibraryId::new),
    }
}

pub async fn find_by_path(tx: &mut impl Executor, path: &str) -> Result<Option<Directory>> {
    let row = sqlx::query("SELECT * FROM directory WHERE path = ?")
        .bind(path)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(row.as_ref().map(row_to_directory))
}

/// Finds the directory row for `path`, creating it (and every missing
/// ancestor up to `media_library_id`'s root) if absent. Mirrors the
/// scanner's discovery walk, which always processes parents before
/// children.
pub async fn find_or_create(
    tx: &mut (impl Executor + WriteCapable),
    path: &str,
    parent: Option<DirectoryId>,
    media_library_id: MediaLibraryId,
) -> Result<DirectoryId> {
    if let Some(existing) = find_by_path(tx, path).await? {
        return Ok(existing.id);
    }
    let result = sqlx::query(
        "INSERT INTO directory (path, parent_directory_id, media_library_id) VALUES (?, ?, ?)",
    )
    .bind(path)
    .bind(parent.map(|p| p.value()))
    .bind(media_library_id.value())
    .execute(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(DirectoryId::new(result.last_insert_rowid()))
}

/// Directories with no parent within `media_library_id`, i.e. the
/// entries a folder-browsing client sees directly under a music
/// folder, the roots `getIndexes` starts from.
pub async fn find_top_level(tx: &mut impl Executor, media_library_id: MediaLibraryId) -> Result<Vec<Directory>> {
    let rows = sqlx::query(
        "SELECT * FROM directory WHERE media_library_id = ? AND parent_directory_id IS NULL ORDER BY path COLLATE NOCASE",
    )
    .bind(media_library_id.value())
    .fetch_all(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(row_to_directory).collect())
}

pub async fn find_orphan_ids(tx: &mut impl Executor) -> Result<Vec<DirectoryId>> {
    let rows = sqlx::query(
        "SELECT directory.id FROM directory \
         LEFT JOIN track ON track.directory_id = directory.id \
         LEFT JOIN directory child ON child.parent_directory_id = directory.id \
         WHERE track.id IS NULL AND child.id IS NULL",
    )
    .fetch_all(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(|r| DirectoryId::new(r.get::<i64, _>("id"))).collect())
}

pub async fn delete(tx: &mut (impl Executor + WriteCapable), id: DirectoryId) -> Result<()> {
    sqlx::query("DELETE FROM directory WHERE id = ?")
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

fn row_to_library(row: &sqlx::sqlite::SqliteRow) -> MediaLibrary {
    MediaLibrary {
        id: MediaLibraryId::new(row.get::<i64, _>("id")),
        name: row.get("name"),
        root_path: row.get("root_path"),
        first_scan: row.get::<i64, _>("first_scan") != 0,
    }
}

pub async fn find_all_libraries(tx: &mut impl Executor) -> Result<Vec<MediaLibrary>> {
    let rows = sqlx::query("SELECT * FROM media_library ORDER BY id")
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(row_to_library).collect())
}

pub async fn find_library_by_id(tx: &mut impl Executor, id: MediaLibraryId) -> Result<MediaLibrary> {
    let row = sqlx::query("SELECT * FROM media_library WHERE id = ?")
        .bind(id.value())
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
        .ok_or(Error::ObjectNotFound)?;
    Ok(row_to_library(&row))
}

pub async fn find_or_create_library(
    tx: &mut (impl Executor + WriteCapable),
    name: &str,
    root_path: &str,
) -> Result<MediaLibraryId> {
    if let Some(row) = sqlx::query("SELECT id FROM media_library WHERE root_path = ?")
        .bind(root_path)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
    {
        return Ok(MediaLibraryId::new(row.get::<i64, _>("id")));
    }
    let result = sqlx::query("INSERT INTO media_library (name, root_path) VALUES (?, ?)")
        .bind(name)
        .bind(root_path)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(MediaLibraryId::new(result.last_insert_rowid()))
}

pub async fn mark_first_scan_done(tx: &mut (impl Executor + WriteCapable), id: MediaLibraryId) -> Result<()> {
    sqlx::query("UPDATE media_library SET first_scan = 0 WHERE id = ?")
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::SessionPool;

    #[tokio::test]
    async fn find_or_create_library_is_idempotent_by_root_path() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        let a = find_or_create_library(&mut tx, "Music", "/music").await.unwrap();
        let b = find_or_create_library(&mut tx, "Music", "/music").await.unwrap();
        assert_eq!(a, b);
    }
}
