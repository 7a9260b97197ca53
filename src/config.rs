//! Read-only configuration surface.
//!
//! Mirrors a dev/prod config split (`.env` via `dotenvy` in debug
//! builds, plain environment variables otherwise) but collapses to a
//! single `Config::load()` since the server has no keyring-backed
//! secrets to manage.

use std::path::PathBuf;

/// A parsed, immutable snapshot of the recognized environment options.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where to place the database file and scratch state.
    pub working_dir: PathBuf,
    /// Media library roots to scan.
    pub media_library_roots: Vec<PathBuf>,
    /// Audio file extensions recognized by the scanner (without the dot).
    pub audio_extensions: Vec<String>,
    /// Client names that should be reported server protocol `1.12.0`.
    pub old_protocol_clients: Vec<String>,
    /// Client names for which OpenSubsonic extensions are suppressed.
    pub open_subsonic_disabled_clients: Vec<String>,
    /// Whether username+password auth is accepted (vs. token-only).
    pub support_user_password_auth: bool,
    /// HTTP header a trusted reverse proxy sets to the already-verified
    /// username, bypassing password/token auth entirely. Unset by
    /// default; a deployment behind no proxy must not opt into this.
    pub trusted_header_name: Option<String>,
    /// Directory sentinel filename that excludes a directory from scanning.
    pub exclude_sentinel: String,
    pub scanner_worker_count: usize,
    pub session_pool_size: usize,
    /// Binary invoked to transcode a track; resolved against
    /// `PATH` when it has no directory component.
    pub transcoder_path: PathBuf,
    /// Kills a transcoding child process that produces no output for
    /// this long, so a stuck `ffmpeg` can't hold a streaming request open
    /// forever.
    pub transcode_inactivity_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            media_library_roots: Vec::new(),
            audio_extensions: vec!["mp3", "flac", "ogg", "opus", "m4a", "aac", "wav", "wma"]
                .into_iter()
                .map(String::from)
                .collect(),
            old_protocol_clients: Vec::new(),
            open_subsonic_disabled_clients: Vec::new(),
            support_user_password_auth: true,
            trusted_header_name: None,
            exclude_sentinel: ".lmsignore".to_string(),
            scanner_worker_count: 4,
            session_pool_size: 8,
            transcoder_path: PathBuf::from("ffmpeg"),
            transcode_inactivity_timeout_secs: 10,
        }
    }
}

fn default_working_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("lms")
}

impl Config {
    /// Loads `.env` in debug builds, then overlays `LMS_*` environment
    /// variables on top of the defaults.
    pub fn load() -> Self {
        #[cfg(debug_assertions)]
        {
            if dotenvy::dotenv().is_ok() {
                tracing::debug!("loaded .env");
            }
        }

        let mut config = Self::default();

        if let Ok(v) = std::env::var("LMS_WORKING_DIR") {
            config.working_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LMS_MEDIA_LIBRARY_ROOTS") {
            config.media_library_roots = split_list(&v).into_iter().map(PathBuf::from).collect();
        }
        if let Ok(v) = std::env::var("LMS_AUDIO_EXTENSIONS") {
            config.audio_extensions = split_list(&v);
        }
        if let Ok(v) = std::env::var("LMS_API_SUBSONIC_OLD_SERVER_PROTOCOL_CLIENTS") {
            config.old_protocol_clients = split_list(&v);
        }
        if let Ok(v) = std::env::var("LMS_API_OPEN_SUBSONIC_DISABLED_CLIENTS") {
            config.open_subsonic_disabled_clients = split_list(&v);
        }
        if let Ok(v) = std::env::var("LMS_API_SUBSONIC_SUPPORT_USER_PASSWORD_AUTH") {
            config.support_user_password_auth = parse_bool(&v, config.support_user_password_auth);
        }
        if let Ok(v) = std::env::var("LMS_EXCLUDE_SENTINEL") {
            config.exclude_sentinel = v;
        }
        if let Ok(v) = std::env::var("LMS_TRUSTED_HEADER_NAME") {
            config.trusted_header_name = Some(v);
        }
        if let Ok(v) = std::env::var("LMS_SCANNER_WORKER_COUNT") {
            if let Ok(n) = v.parse() {
                config.scanner_worker_count = n;
            }
        }
        if let Ok(v) = std::env::var("LMS_SESSION_POOL_SIZE") {
            if let Ok(n) = v.parse() {
                config.session_pool_size = n;
            }
        }
        if let Ok(v) = std::env::var("LMS_TRANSCODER_PATH") {
            config.transcoder_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LMS_TRANSCODE_INACTIVITY_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                config.transcode_inactivity_timeout_secs = n;
            }
        }

        config
    }

    pub fn database_path(&self) -> PathBuf {
        self.working_dir.join("lms.db")
    }

    pub fn reports_old_protocol_to(&self, client_name: &str) -> bool {
        self.old_protocol_clients.iter().any(|c| c == client_name)
    }

    pub fn open_subsonic_enabled_for(&self, client_name: &str) -> bool {
        !self
            .open_subsonic_disabled_clients
            .iter()
            .any(|c| c == client_name)
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(v: &str, default: bool) -> bool {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_nonempty_audio_extensions() {
        let config = Config::default();
        assert!(!config.audio_extensions.is_empty());
        assert_eq!(config.exclude_sentinel, ".lmsignore");
    }

    #[test]
    fn old_protocol_lookup() {
        let mut config = Config::default();
        config.old_protocol_clients.push("LegacyClient".to_string());
        assert!(config.reports_old_protocol_to("LegacyClient"));
        assert!(!config.reports_old_protocol_to("OtherClient"));
    }
}
