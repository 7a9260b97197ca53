//! The single-row scan settings and version-info finders.

use sqlx::Row;

use super::error::{Error, Result};
use super::models::{ScanSettings, VersionInfo};
use super::pool::{Executor, WriteCapable};

pub async fn find(tx: &mut impl Executor) -> Result<ScanSettings> {
    let row = sqlx::query("SELECT * FROM scan_settings WHERE id = 1")
        .fetch_one(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(ScanSettings {
        media_directories: serde_json::from_str(row.get::<String, _>("media_directories_json").as_str())
            .unwrap_or_default(),
        audio_extensions: serde_json::from_str(row.get::<String, _>("audio_extensions_json").as_str())
            .unwrap_or_default(),
        update_period: row.get("update_period"),
        scan_version: row.get("scan_version"),
    })
}

/// Overwrites the scan settings and, when `bump_scan_version` is set,
/// increments `scan_version` so the next scan reparses every track
/// regardless of its stored `last_write_time`.
pub async fn update(
    tx: &mut (impl Executor + WriteCapable),
    media_directories: &[String],
    audio_extensions: &[String],
    update_period: Option<&str>,
    bump_scan_version: bool,
) -> Result<()> {
    let media_json = serde_json::to_string(media_directories).unwrap();
    let extensions_json = serde_json::to_string(audio_extensions).unwrap();
    if bump_scan_version {
        sqlx::query(
            "UPDATE scan_settings SET media_directories_json = ?, audio_extensions_json = ?, \
             update_period = ?, scan_version = scan_version + 1 WHERE id = 1",
        )
    } else {
        sqlx::query(
            "UPDATE scan_settings SET media_directories_json = ?, audio_extensions_json = ?, \
             update_period = ? WHERE id = 1",
        )
    }
    .bind(media_json)
    .bind(extensions_json)
    .bind(update_period)
    .execute(tx.connection())
    .await
    .map_err(Error::from_sqlx)?;
    Ok(())
}

pub async fn find_version_info(tx: &mut impl Executor) -> Result<VersionInfo> {
    let row = sqlx::query("SELECT db_version FROM version_info WHERE id = 1")
        .fetch_one(tx.connection())
        .await
        .map_err(Error::from_sqlx)?;
    Ok(VersionInfo {
        db_version: row.get("db_version"),
    })
}
