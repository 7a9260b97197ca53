//! Cluster and ClusterType finders.

use sqlx::Row;

use crate::ids::{ClusterId, ClusterTypeId};

use super::error::{Error, Result};
use super::models::{Cluster, ClusterType};
use super::pool::{Executor, WriteCapable};

pub async fn find_or_create_type(tx: &mut (impl Executor + WriteCapable), name: &str) -> Result<ClusterTypeId> {
    if let Some(row) = sqlx::query("SELECT id FROM cluster_type WHERE name = ?")
        .bind(name)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
    {
        return Ok(ClusterTypeId::new(row.get::<i64, _>("id")));
    }
    let result = sqlx::query("INSERT INTO cluster_type (name) VALUES (?)")
        .bind(name)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(ClusterTypeId::new(result.last_insert_rowid()))
}

pub async fn find_all_types(tx: &mut impl Executor) -> Result<Vec<ClusterType>> {
    let rows = sqlx::query("SELECT * FROM cluster_type ORDER BY name")
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|r| ClusterType {
            id: ClusterTypeId::new(r.get::<i64, _>("id")),
            name: r.get("name"),
        })
        .collect())
}

pub async fn find_or_create(
    tx: &mut (impl Executor + WriteCapable),
    cluster_type_id: ClusterTypeId,
    name: &str,
) -> Result<ClusterId> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName("cluster name must not be empty".into()));
    }
    if let Some(row) = sqlx::query("SELECT id FROM cluster WHERE cluster_type_id = ? AND name = ?")
        .bind(cluster_type_id.value())
        .bind(name)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
    {
        return Ok(ClusterId::new(row.get::<i64, _>("id")));
    }
    let result = sqlx::query("INSERT INTO cluster (cluster_type_id, name) VALUES (?, ?)")
        .bind(cluster_type_id.value())
        .bind(name)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(ClusterId::new(result.last_insert_rowid()))
}

pub async fn find_for_track(tx: &mut impl Executor, track_id: crate::ids::TrackId) -> Result<Vec<Cluster>> {
    let rows = sqlx::query(
        "SELECT cluster.* FROM cluster \
         JOIN track_cluster_link ON track_cluster_link.cluster_id = cluster.id \
         WHERE track_cluster_link.track_id = ?",
    )
    .bind(track_id.value())
    .fetch_all(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|r| Cluster {
            id: ClusterId::new(r.get::<i64, _>("id")),
            cluster_type_id: ClusterTypeId::new(r.get::<i64, _>("cluster_type_id")),
            name: r.get("name"),
        })
        .collect())
}

/// Every cluster of the named type (e.g. `"genre"`) with the song and
/// distinct-album counts `getGenres` reports alongside each one.
pub async fn find_with_counts_by_type_name(tx: &mut impl Executor, type_name: &str) -> Result<Vec<(Cluster, i64, i64)>> {
    let rows = sqlx::query(
        "SELECT cluster.*, \
         COUNT(DISTINCT track_cluster_link.track_id) AS song_count, \
         COUNT(DISTINCT track.release_id) AS album_count \
         FROM cluster \
         JOIN cluster_type ON cluster_type.id = cluster.cluster_type_id \
         LEFT JOIN track_cluster_link ON track_cluster_link.cluster_id = cluster.id \
         LEFT JOIN track ON track.id = track_cluster_link.track_id \
         WHERE cluster_type.name = ? \
         GROUP BY cluster.id \
         ORDER BY cluster.name COLLATE NOCASE",
    )
    .bind(type_name)
    .fetch_all(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|r| {
            (
                Cluster {
                    id: ClusterId::new(r.get::<i64, _>("id")),
                    cluster_type_id: ClusterTypeId::new(r.get::<i64, _>("cluster_type_id")),
                    name: r.get("name"),
                },
                r.get::<i64, _>("song_count"),
                r.get::<i64, _>("album_count"),
            )
        })
        .collect())
}

/// Clusters with no remaining track link, candidates for deletion
/// during orphan reconciliation.
pub async fn find_orphan_ids(tx: &mut impl Executor) -> Result<Vec<ClusterId>> {
    let rows = sqlx::query(
        "SELECT cluster.id FROM cluster \
         LEFT JOIN track_cluster_link ON track_cluster_link.cluster_id = cluster.id \
         WHERE track_cluster_link.track_id IS NULL",
    )
    .fetch_all(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(rows.iter().map(|r| ClusterId::new(r.get::<i64, _>("id"))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::SessionPool;

    #[tokio::test]
    async fn find_or_create_cluster_is_idempotent() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        let genre = find_or_create_type(&mut tx, "genre").await.unwrap();
        let a = find_or_create(&mut tx, genre, "Ambient").await.unwrap();
        let b = find_or_create(&mut tx, genre, "Ambient").await.unwrap();
        assert_eq!(a, b);
    }
}
