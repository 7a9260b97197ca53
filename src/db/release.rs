//! Release and Medium finders.

use sqlx::Row;

use crate::ids::{MediumId, ReleaseId};

use super::error::{Error, Result};
use super::find::{cluster_and_filter_fragment, like_escape, push_range, FindParameters, SortMethod};
use super::models::{Medium, MediumKind, Release};
use super::pool::{Executor, WriteCapable};

async fn tags_for(tx: &mut impl Executor, table: &str, column: &str, release_id: ReleaseId) -> Result<Vec<String>> {
    let sql = format!("SELECT {column} FROM {table} WHERE release_id = ?");
    let rows = sqlx::query(&sql)
        .bind(release_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(|r| r.get::<String, _>(0)).collect())
}

async fn row_to_release(tx: &mut impl Executor, row: &sqlx::sqlite::SqliteRow) -> Result<Release> {
    let id = ReleaseId::new(row.get::<i64, _>("id"));
    Ok(Release {
        id,
        name: row.get("name"),
        sort_name: row.get("sort_name"),
        mbid: row.get("mbid"),
        release_group_mbid: row.get("release_group_mbid"),
        total_medium_count: row.get("total_medium_count"),
        compilation: row.get::<i64, _>("compilation") != 0,
        barcode: row.get("barcode"),
        comment: row.get("comment"),
        artist_display_name: row.get("artist_display_name"),
        preferred_artwork_id: row
            .get::<Option<i64>, _>("preferred_artwork_id")
            .map(crate::ids::ArtworkId::new),
        labels: tags_for(tx, "release_label", "label", id).await?,
        countries: tags_for(tx, "release_country", "country", id).await?,
        release_types: tags_for(tx, "release_type", "release_type", id).await?,
    })
}

pub async fn find_by_id(tx: &mut impl Executor, id: ReleaseId) -> Result<Release> {
    let row = sqlx::query("SELECT * FROM release WHERE id = ?")
        .bind(id.value())
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
        .ok_or(Error::ObjectNotFound)?;
    row_to_release(tx, &row).await
}

pub async fn find(tx: &mut impl Executor, params: &FindParameters) -> Result<Vec<Release>> {
    let mut sql = String::from("SELECT DISTINCT release.* FROM release");
    let mut conditions = Vec::new();

    if !params.clusters.is_empty() {
        sql.push_str(" JOIN track ON track.release_id = release.id");
        if let Some(fragment) = cluster_and_filter_fragment(&params.clusters, "track.id") {
            conditions.push(fragment);
        }
    }
    for term in params.keywords.iter().map(|k| like_escape(k)) {
        conditions.push(format!(
            "release.name LIKE '{}' ESCAPE '\\'",
            term.replace('\'', "''")
        ));
    }
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    match params.sort_method {
        SortMethod::SortName => sql.push_str(" ORDER BY release.sort_name COLLATE NOCASE"),
        SortMethod::Name => sql.push_str(" ORDER BY release.name COLLATE NOCASE"),
        SortMethod::Random => sql.push_str(" ORDER BY RANDOM()"),
        _ => sql.push_str(" ORDER BY release.sort_name COLLATE NOCASE"),
    }
    push_range(&mut sql, params.range);

    let rows = sqlx::query(&sql)
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    let mut result = Vec::with_capacity(rows.len());
    for row in &rows {
        result.push(row_to_release(tx, row).await?);
    }
    Ok(result)
}

/// Releases credited to `artist_id` via a `release_artist` link, for
/// `getArtist`'s album list.
pub async fn find_for_artist(tx: &mut impl Executor, artist_id: crate::ids::ArtistId) -> Result<Vec<Release>> {
    let rows = sqlx::query(
        "SELECT DISTINCT release.* FROM release \
         JOIN track ON track.release_id = release.id \
         JOIN track_artist_link ON track_artist_link.track_id = track.id \
         WHERE track_artist_link.artist_id = ? AND track_artist_link.role = 'release_artist' \
         ORDER BY release.sort_name COLLATE NOCASE",
    )
    .bind(artist_id.value())
    .fetch_all(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    let mut result = Vec::with_capacity(rows.len());
    for row in &rows {
        result.push(row_to_release(tx, row).await?);
    }
    Ok(result)
}

pub async fn find_orphan_ids(tx: &mut impl Executor) -> Result<Vec<ReleaseId>> {
    let rows = sqlx::query(
        "SELECT release.id FROM release \
         LEFT JOIN track ON track.release_id = release.id WHERE track.id IS NULL",
    )
    .fetch_all(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|r| ReleaseId::new(r.get::<i64, _>("id")))
        .collect())
}

pub async fn find_or_create(
    tx: &mut (impl Executor + WriteCapable),
    name: &str,
    sort_name: &str,
    mbid: Option<&str>,
) -> Result<ReleaseId> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName("release name must not be empty".into()));
    }
    if let Some(mbid) = mbid {
        if let Some(row) = sqlx::query("SELECT id FROM release WHERE mbid = ?")
            .bind(mbid)
            .fetch_optional(tx.connection())
            .await
            .map_err(Error::from_sqlx)?
        {
            return Ok(ReleaseId::new(row.get::<i64, _>("id")));
        }
    }
    let result = sqlx::query("INSERT INTO release (name, sort_name, mbid) VALUES (?, ?, ?)")
        .bind(name)
        .bind(sort_name)
        .bind(mbid)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(ReleaseId::new(result.last_insert_rowid()))
}

pub async fn set_preferred_artwork(
    tx: &mut (impl Executor + WriteCapable),
    id: ReleaseId,
    artwork_id: Option<crate::ids::ArtworkId>,
) -> Result<()> {
    sqlx::query("UPDATE release SET preferred_artwork_id = ? WHERE id = ?")
        .bind(artwork_id.map(|a| a.value()))
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

pub async fn delete(tx: &mut (impl Executor + WriteCapable), id: ReleaseId) -> Result<()> {
    sqlx::query("DELETE FROM release WHERE id = ?")
        .bind(id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

fn row_to_medium(row: &sqlx::sqlite::SqliteRow) -> Medium {
    Medium {
        id: MediumId::new(row.get::<i64, _>("id")),
        release_id: ReleaseId::new(row.get::<i64, _>("release_id")),
        position: row.get("position"),
        track_count: row.get("track_count"),
        media: row.get::<Option<String>, _>("media").map(|m| MediumKind::parse(&m)),
        replay_gain: row.get("replay_gain"),
        preferred_artwork_id: row
            .get::<Option<i64>, _>("preferred_artwork_id")
            .map(crate::ids::ArtworkId::new),
    }
}

pub async fn find_media_for_release(tx: &mut impl Executor, release_id: ReleaseId) -> Result<Vec<Medium>> {
    let rows = sqlx::query("SELECT * FROM medium WHERE release_id = ? ORDER BY position")
        .bind(release_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(row_to_medium).collect())
}

pub async fn find_or_create_medium(
    tx: &mut (impl Executor + WriteCapable),
    release_id: ReleaseId,
    position: Option<i64>,
    media: Option<MediumKind>,
) -> Result<MediumId> {
    if let Some(row) = sqlx::query("SELECT id FROM medium WHERE release_id = ? AND position IS ?")
        .bind(release_id.value())
        .bind(position)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
    {
        return Ok(MediumId::new(row.get::<i64, _>("id")));
    }
    let result = sqlx::query("INSERT INTO medium (release_id, position, media) VALUES (?, ?, ?)")
        .bind(release_id.value())
        .bind(position)
        .bind(media.map(|m| m.as_str()))
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(MediumId::new(result.last_insert_rowid()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::SessionPool;

    #[tokio::test]
    async fn release_roundtrips_tag_tables() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        let id = find_or_create(&mut tx, "Geogaddi", "Geogaddi", None).await.unwrap();
        sqlx::query("INSERT INTO release_country (release_id, country) VALUES (?, 'GB')")
            .bind(id.value())
            .execute(tx.connection())
            .await
            .unwrap();
        let release = find_by_id(&mut tx, id).await.unwrap();
        assert_eq!(release.countries, vec!["GB".to_string()]);
    }
}
