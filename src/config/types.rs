use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub plex: PlexConfig,

    #[serde(default)]
    pub themes: ThemesConfig,

    #[serde(default)]
    pub themedb: ThemeDbConfig,
}

/// Connection settings for the host media server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlexConfig {
    #[serde(default = "default_plex_url")]
    pub url: String,

    /// Authentication token, sent as `X-Plex-Token` on every request.
    #[serde(default)]
    pub token: String,

    /// Request timeout in seconds, also applied to theme uploads.
    #[serde(default = "default_plex_timeout")]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification (for servers with self-signed certs).
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// The host server's `Metadata` directory, when overture runs on the same
    /// machine. Enables removal of stale uploaded media; leave unset to
    /// disable.
    #[serde(default)]
    pub metadata_dir: Option<PathBuf>,
}

fn default_plex_url() -> String {
    // the explicit IPv4 address is used because `localhost` can resolve to
    // ::1, which the websocket endpoint rejects
    "http://127.0.0.1:32400".to_string()
}

fn default_plex_timeout() -> u64 {
    180
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            url: default_plex_url(),
            token: String::new(),
            timeout_secs: default_plex_timeout(),
            accept_invalid_certs: false,
            metadata_dir: None,
        }
    }
}

/// Behavior preferences for the update pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThemesConfig {
    /// Master switch for the scheduled library scan.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub movie_support: bool,

    #[serde(default = "default_true")]
    pub series_support: bool,

    #[serde(default = "default_true")]
    pub collection_support: bool,

    /// Also update poster/art/summary for collections from the theme
    /// database record.
    #[serde(default = "default_true")]
    pub update_collections: bool,

    /// Overwrite fields even when the host marks them as user-locked.
    #[serde(default)]
    pub ignore_locked_fields: bool,

    /// Replace themes the host server provided itself.
    #[serde(default)]
    pub overwrite_plex_themes: bool,

    /// Prefer the mp4a audio stream over opus when both are available.
    #[serde(default)]
    pub prefer_mp4a_codec: bool,

    #[serde(default)]
    pub remove_unused_art: bool,

    #[serde(default)]
    pub remove_unused_posters: bool,

    #[serde(default)]
    pub remove_unused_themes: bool,

    /// Minutes between full library scans. Floored at 15.
    #[serde(default = "default_interval")]
    pub update_interval_mins: u64,

    /// Minutes between existence-cache refreshes. Floored at 15.
    #[serde(default = "default_interval")]
    pub cache_interval_mins: u64,

    /// Upload retry ceiling; a failing upload is attempted `1 + max` times.
    #[serde(default = "default_upload_retries")]
    pub upload_retries_max: u32,

    /// Number of concurrent upload workers. Floored at 1.
    #[serde(default = "default_upload_workers")]
    pub upload_workers: usize,

    /// Directory for overture's local applied-state records.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    60
}

fn default_upload_retries() -> u32 {
    3
}

fn default_upload_workers() -> usize {
    3
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(shellexpand::tilde("~/.local/share/overture").as_ref())
}

impl Default for ThemesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            movie_support: true,
            series_support: true,
            collection_support: true,
            update_collections: true,
            ignore_locked_fields: false,
            overwrite_plex_themes: false,
            prefer_mp4a_codec: false,
            remove_unused_art: false,
            remove_unused_posters: false,
            remove_unused_themes: false,
            update_interval_mins: default_interval(),
            cache_interval_mins: default_interval(),
            upload_retries_max: default_upload_retries(),
            upload_workers: default_upload_workers(),
            data_dir: default_data_dir(),
        }
    }
}

impl ThemesConfig {
    /// Whether updates are enabled for the given metadata agent.
    pub fn agent_enabled(&self, agent: &str) -> bool {
        match agent {
            crate::types::MOVIE_AGENT => self.movie_support,
            crate::types::SERIES_AGENT => self.series_support,
            _ => false,
        }
    }
}

/// Location of the theme database deployment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThemeDbConfig {
    #[serde(default = "default_themedb_url")]
    pub base_url: String,
}

fn default_themedb_url() -> String {
    "https://app.lizardbyte.dev/ThemerrDB".to_string()
}

impl Default for ThemeDbConfig {
    fn default() -> Self {
        Self {
            base_url: default_themedb_url(),
        }
    }
}
