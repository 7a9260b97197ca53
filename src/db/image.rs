//! Embedded-image dedup and artwork finders.

use sqlx::Row;

use crate::ids::{ArtworkId, TrackEmbeddedImageId, TrackId};
use crate::primitives::ImageHash;

use super::error::{Error, Result};
use super::models::{Artwork, ArtworkKind, EmbeddedImageType, TrackEmbeddedImage, TrackEmbeddedImageLink};
use super::pool::{Executor, WriteCapable};

/// Deduplicates an embedded image by `(size, hash)`: if an identical
/// image is already stored under a different track, this returns the
/// existing row rather than inserting a duplicate.
pub async fn find_or_create_image(
    tx: &mut (impl Executor + WriteCapable),
    size: i64,
    hash: ImageHash,
    width: u32,
    height: u32,
    mime_type: &str,
) -> Result<TrackEmbeddedImageId> {
    let hash_str = hash.to_storage_string();
    if let Some(row) = sqlx::query("SELECT id FROM track_embedded_image WHERE size = ? AND hash = ?")
        .bind(size)
        .bind(&hash_str)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
    {
        return Ok(TrackEmbeddedImageId::new(row.get::<i64, _>("id")));
    }
    let result = sqlx::query(
        "INSERT INTO track_embedded_image (size, hash, width, height, mime_type) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(size)
    .bind(&hash_str)
    .bind(width as i64)
    .bind(height as i64)
    .bind(mime_type)
    .execute(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(TrackEmbeddedImageId::new(result.last_insert_rowid()))
}

pub async fn find_image_by_id(tx: &mut impl Executor, id: TrackEmbeddedImageId) -> Result<TrackEmbeddedImage> {
    let row = sqlx::query("SELECT * FROM track_embedded_image WHERE id = ?")
        .bind(id.value())
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
        .ok_or(Error::ObjectNotFound)?;
    Ok(TrackEmbeddedImage {
        id,
        size: row.get("size"),
        hash: ImageHash::from_storage_string(row.get::<String, _>("hash").as_str())
            .ok_or_else(|| Error::Corruption("malformed image hash".into()))?,
        width: row.get::<i64, _>("width") as u32,
        height: row.get::<i64, _>("height") as u32,
        mime_type: row.get("mime_type"),
    })
}

pub async fn link_image_to_track(
    tx: &mut (impl Executor + WriteCapable),
    track_id: TrackId,
    image_id: TrackEmbeddedImageId,
    index: i64,
    image_type: EmbeddedImageType,
    description: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO track_embedded_image_link (track_id, image_id, idx, image_type, description) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(track_id.value())
    .bind(image_id.value())
    .bind(index)
    .bind(image_type.as_str())
    .bind(description)
    .execute(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(())
}

pub async fn clear_image_links(tx: &mut (impl Executor + WriteCapable), track_id: TrackId) -> Result<()> {
    sqlx::query("DELETE FROM track_embedded_image_link WHERE track_id = ?")
        .bind(track_id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(())
}

pub async fn find_links_for_track(
    tx: &mut impl Executor,
    track_id: TrackId,
) -> Result<Vec<TrackEmbeddedImageLink>> {
    let rows = sqlx::query("SELECT * FROM track_embedded_image_link WHERE track_id = ? ORDER BY idx")
        .bind(track_id.value())
        .fetch_all(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|r| TrackEmbeddedImageLink {
            track_id,
            image_id: TrackEmbeddedImageId::new(r.get::<i64, _>("image_id")),
            index: r.get("idx"),
            image_type: EmbeddedImageType::parse(r.get::<String, _>("image_type").as_str()),
            description: r.get("description"),
        })
        .collect())
}

/// Finds the link row that first attached an embedded image, the
/// reverse lookup streaming uses to locate the track whose file must be
/// re-read to recover the image bytes (the dedup table only stores the
/// hash/dimensions, never the bytes themselves).
pub async fn find_link_for_image(
    tx: &mut impl Executor,
    image_id: TrackEmbeddedImageId,
) -> Result<Option<TrackEmbeddedImageLink>> {
    let row = sqlx::query("SELECT * FROM track_embedded_image_link WHERE image_id = ? ORDER BY idx LIMIT 1")
        .bind(image_id.value())
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(row.map(|r| TrackEmbeddedImageLink {
        track_id: TrackId::new(r.get::<i64, _>("track_id")),
        image_id,
        index: r.get("idx"),
        image_type: EmbeddedImageType::parse(r.get::<String, _>("image_type").as_str()),
        description: r.get("description"),
    }))
}

/// Finds the front-cover image link for a track, the default pick when
/// recomputing preferred artwork.
pub async fn find_front_cover_link(
    tx: &mut impl Executor,
    track_id: TrackId,
) -> Result<Option<TrackEmbeddedImageLink>> {
    Ok(find_links_for_track(tx, track_id)
        .await?
        .into_iter()
        .find(|l| l.image_type == EmbeddedImageType::FrontCover))
}

pub async fn find_or_create_embedded_artwork(
    tx: &mut (impl Executor + WriteCapable),
    embedded_image_id: TrackEmbeddedImageId,
) -> Result<ArtworkId> {
    if let Some(row) = sqlx::query("SELECT id FROM artwork WHERE embedded_image_id = ?")
        .bind(embedded_image_id.value())
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
    {
        return Ok(ArtworkId::new(row.get::<i64, _>("id")));
    }
    let result = sqlx::query("INSERT INTO artwork (kind, embedded_image_id) VALUES ('embedded', ?)")
        .bind(embedded_image_id.value())
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(ArtworkId::new(result.last_insert_rowid()))
}

pub async fn find_or_create_standalone_artwork(
    tx: &mut (impl Executor + WriteCapable),
    absolute_file_path: &str,
) -> Result<ArtworkId> {
    if let Some(row) = sqlx::query("SELECT id FROM artwork WHERE absolute_file_path = ?")
        .bind(absolute_file_path)
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
    {
        return Ok(ArtworkId::new(row.get::<i64, _>("id")));
    }
    let result = sqlx::query("INSERT INTO artwork (kind, absolute_file_path) VALUES ('standalone', ?)")
        .bind(absolute_file_path)
        .execute(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(ArtworkId::new(result.last_insert_rowid()))
}

pub async fn find_artwork_by_id(tx: &mut impl Executor, id: ArtworkId) -> Result<Artwork> {
    let row = sqlx::query("SELECT * FROM artwork WHERE id = ?")
        .bind(id.value())
        .fetch_optional(tx.connection())
        .await
        .map_err(Error::from_sqlx)?
        .ok_or(Error::ObjectNotFound)?;
    Ok(Artwork {
        id,
        kind: if row.get::<String, _>("kind") == "embedded" {
            ArtworkKind::Embedded
        } else {
            ArtworkKind::Standalone
        },
        absolute_file_path: row.get("absolute_file_path"),
        embedded_image_id: row.get::<Option<i64>, _>("embedded_image_id").map(TrackEmbeddedImageId::new),
    })
}

pub async fn find_orphan_image_ids(tx: &mut impl Executor) -> Result<Vec<TrackEmbeddedImageId>> {
    let rows = sqlx::query(
        "SELECT track_embedded_image.id FROM track_embedded_image \
         LEFT JOIN track_embedded_image_link ON track_embedded_image_link.image_id = track_embedded_image.id \
         WHERE track_embedded_image_link.id IS NULL",
    )
    .fetch_all(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(rows
        .iter()
        .map(|r| TrackEmbeddedImageId::new(r.get::<i64, _>("id")))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::pool::SessionPool;

    #[tokio::test]
    async fn identical_image_is_deduplicated() {
        let pool = SessionPool::connect_in_memory().await.unwrap();
        let session = pool.session().await.unwrap();
        let mut tx = session.write().await.unwrap();
        let a = find_or_create_image(&mut tx, 1024, ImageHash(42), 500, 500, "image/jpeg")
            .await
            .unwrap();
        let b = find_or_create_image(&mut tx, 1024, ImageHash(42), 500, 500, "image/jpeg")
            .await
            .unwrap();
        assert_eq!(a, b);
    }
}
