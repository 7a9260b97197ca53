//! Filesystem discovery: recursive walk of each media library root,
//! skipping directories marked with the exclude sentinel and files
//! whose extension isn't recognized as audio.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub file_size: u64,
    pub last_write_time: std::time::SystemTime,
}

/// Walks `root` depth-first, returning every recognized audio file and
/// the set of directories visited (including empty ones, which matter
/// for the directory tree that tracks reference via `directory_id`).
pub fn walk(
    root: &Path,
    audio_extensions: &[String],
    exclude_sentinel: &str,
) -> (Vec<DiscoveredFile>, Vec<PathBuf>) {
    let mut files = Vec::new();
    let mut directories = Vec::new();
    walk_inner(root, audio_extensions, exclude_sentinel, &mut files, &mut directories);
    (files, directories)
}

fn walk_inner(
    dir: &Path,
    audio_extensions: &[String],
    exclude_sentinel: &str,
    files: &mut Vec<DiscoveredFile>,
    directories: &mut Vec<PathBuf>,
) {
    if dir.join(exclude_sentinel).exists() {
        return;
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    directories.push(dir.to_path_buf());

    let mut subdirectories = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else { continue };

        if file_type.is_dir() {
            subdirectories.push(path);
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !audio_extensions.iter().any(|e| e.eq_ignore_ascii_case(extension)) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(last_write_time) = metadata.modified() else { continue };
        files.push(DiscoveredFile {
            path,
            file_size: metadata.len(),
            last_write_time,
        });
    }

    subdirectories.sort();
    for subdirectory in subdirectories {
        walk_inner(&subdirectory, audio_extensions, exclude_sentinel, files, directories);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_audio_files_and_skips_excluded_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("track.flac"), b"").unwrap();
        std::fs::write(dir.path().join("cover.jpg"), b"").unwrap();

        let excluded = dir.path().join("excluded");
        std::fs::create_dir(&excluded).unwrap();
        std::fs::write(excluded.join(".lmsignore"), b"").unwrap();
        std::fs::write(excluded.join("hidden.flac"), b"").unwrap();

        let (files, _dirs) = walk(dir.path(), &["flac".to_string()], ".lmsignore");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path.file_name().unwrap(), "track.flac");
    }
}
