//! Artist finders and mutations.

use sqlx::Row;

use crate::ids::{ArtistId, IdRange};

use super::error::{Error, Result};
use super::find::{cluster_and_filter_fragment, like_escape, push_range, FindParameters, SortMethod};
use super::models::Artist;
use super::pool::{Executor, WriteCapable};

fn row_to_artist(row: &sqlx::sqlite::SqliteRow) -> Artist {
    Artist {
        id: ArtistId::new(row.get::<i64, _>("id")),
        name: row.get("name"),
        sort_name: row.get("sort_name"),
        mbid: row.get("mbid"),
    }
}

pub async fn find_by_id(tx: &mut impl Executor, id: ArtistId) -> Result<Artist> {
    let row = sqlx::query("SELECT * FROM artist WHERE id = ?")
        .bind(id.value())
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
        .ok_or(Error::ObjectNotFound)?;
    Ok(row_to_artist(&row))
}

pub async fn find(tx: &mut impl Executor, params: &FindParameters) -> Result<Vec<Artist>> {
    let mut sql = String::from("SELECT DISTINCT artist.* FROM artist");
    let mut conditions = Vec::new();

    if !params.clusters.is_empty() {
        sql.push_str(
            " JOIN track_artist_link ON track_artist_link.artist_id = artist.id",
        );
        if let Some(fragment) =
            cluster_and_filter_fragment(&params.clusters, "track_artist_link.track_id")
        {
            conditions.push(fragment);
        }
    }

    let like_terms: Vec<String> = params.keywords.iter().map(|k| like_escape(k)).collect();
    for term in &like_terms {
        conditions.push(format!(
            "artist.name LIKE '{}' ESCAPE '\\'",
            term.replace('\'', "''")
        ));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    match params.sort_method {
        SortMethod::SortName => sql.push_str(" ORDER BY artist.sort_name COLLATE NOCASE"),
        SortMethod::Name => sql.push_str(" ORDER BY artist.name COLLATE NOCASE"),
        SortMethod::Random => sql.push_str(" ORDER BY RANDOM()"),
        _ => sql.push_str(" ORDER BY artist.sort_name COLLATE NOCASE"),
    }

    push_range(&mut sql, params.range);

    let rows = sqlx::query(&sql)
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(row_to_artist).collect())
}

pub async fn find_ids(tx: &mut impl Executor, params: &FindParameters) -> Result<Vec<ArtistId>> {
    Ok(find(tx, params)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect())
}

/// Artists with no remaining track credits, candidates for deletion
/// during orphan reconciliation.
pub async fn find_orphan_ids(tx: &mut impl Executor) -> Result<Vec<ArtistId>> {
    let rows = sqlx::query(
        "SELECT artist.id FROM artist \
         LEFT JOIN track_artist_link ON track_artist_link.artist_id = artist.id \
         WHERE track_artist_link.track_id IS NULL",
    )
    .fetch_all(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|r| ArtistId::new(r.get::<i64, _>("id")))
        .collect())
}

pub async fn find_next_id_range(
    tx: &mut impl Executor,
    after: ArtistId,
    batch_size: i64,
) -> Result<IdRange<crate::ids::kind::Artist>> {
    let row = sqlx::query(
        "SELECT MIN(id) as first, MAX(id) as last FROM \
         (SELECT id FROM artist WHERE id > ? ORDER BY id LIMIT ?)",
    )
    .bind(after.value())
    .bind(batch_size)
    .fetch_one(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;

    let first: Option<i64> = row.get("first");
    let last: Option<i64> = row.get("last");
    match (first, last) {
        (Some(f), Some(l)) => Ok(IdRange {
            first: ArtistId::new(f),
            last: ArtistId::new(l),
        }),
        _ => Ok(IdRange::empty()),
    }
}

/// Finds an artist by exact name and MusicBrainz id, or inserts a new
/// row. Used by the scanner to resolve a parsed credit to a catalog
/// artist without creating duplicates.
pub async fn find_or_create(
    tx: &mut (impl Executor + WriteCapable),
    name: &str,
    sort_name: &str,
    mbid: Option<&str>,
) -> Result<ArtistId> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName("artist name must not be empty".into()));
    }

    if let Some(mbid) = mbid {
        let existing = sqlx::query("SELECT id FROM artist WHERE mbid = ?")
            .bind(mbid)
            .fetch_optional(tx.connection())
            .await
            .map_err(Error::from_sqlx)?;
        if let Some(row) = existing {
            return Ok(ArtistId::new(row.get::<i64, _>("id")));
        }
    } else {
        let existing = sqlx::query("SELECT id FROM artist WHERE name = ? AND mbid IS NULL")
            .bind(name)
            .fetch_optional(tx.connection())
            .await
            .map_err(Error::from_sqlx)?;
        if let Some(row) = existing {
            return Ok(ArtistId::new(row.get::<i64, _>("id")));
        }
    }

    let result = sqlx::query("INSERT INTO artist (name, sort_name, mbid) VALUES (?, ?, ?)")
        .bind(name)
        .bind(sort_name)
        .bind(mbid)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(ArtistId::new(result.last_insert_rowid()))
}

pub async fn delete(tx: &mut (impl Executor + WriteCapable), id: ArtistId) -> Result<()> {
    sqlx::query("DELETE FROM artist WHERE id = ?")
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
    async fn find_or_create_is_idempotent_by_mbid() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();

        let a = find_or_create(&mut tx, "Boards of Canada", "Boards of Canada", Some("mbid-1"))
            .await
            .unwrap();
        let b = find_or_create(&mut tx, "Boards of Canada", "Boards of Canada", Some("mbid-1"))
            .await
            .unwrap();
        assert_eq!(a, b);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        let err = find_or_create(&mut tx, "   ", "", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)));
    }

    #[tokio::test]
    async fn next_id_range_is_empty_past_the_last_row() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        let a = find_or_create(&mut tx, "A", "A", None).await.unwrap();

        let range = find_next_id_range(&mut tx, a, 10).await.unwrap();
        assert!(!range.is_valid());
    }

    #[tokio::test]
    async fn next_id_range_respects_batch_size() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        for name in ["A", "B", "C", "D"] {
            find_or_create(&mut tx, name, name, None).await.unwrap();
        }

        let range = find_next_id_range(&mut tx, ArtistId::new(0), 2).await.unwrap();
        assert!(range.first.value() > 0);
        assert!(range.last.value() - range.first.value() + 1 <= 2);
    }
}
