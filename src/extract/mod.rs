//! Playable audio URL extraction for theme videos.
//!
//! The theme database stores a video URL; the host server wants a direct
//! audio stream it can download itself. Extraction shells out to `yt-dlp`
//! and picks the best audio-only format. The [`ThemeResolver`] trait exists
//! so the pipeline can be driven with a stub in tests.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Resolves a theme video URL into a directly playable audio URL.
#[async_trait]
pub trait ThemeResolver: Send + Sync {
    /// Returns `Ok(None)` when no suitable audio stream could be extracted;
    /// expected extractor failures (removed/region-locked videos) land here
    /// rather than in `Err`.
    async fn resolve(&self, url: &str) -> Result<Option<String>>;
}

/// Errors from driving the `yt-dlp` binary itself.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("yt-dlp binary not found; install yt-dlp and ensure it is on PATH")]
    BinaryNotFound(#[from] which::Error),

    #[error("failed to run yt-dlp: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    entries: Option<Vec<VideoInfo>>,
    #[serde(default)]
    formats: Vec<Format>,
}

#[derive(Debug, Deserialize)]
struct Format {
    #[serde(default)]
    format: String,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    filesize: Option<u64>,
    #[serde(default)]
    url: Option<String>,
}

pub struct YtDlpResolver {
    binary: PathBuf,
    prefer_mp4a: bool,
}

impl YtDlpResolver {
    /// Locate `yt-dlp` on PATH.
    pub fn discover(prefer_mp4a: bool) -> Result<Self, ExtractError> {
        let binary = which::which("yt-dlp")?;
        debug!("Using yt-dlp at {:?}", binary);
        Ok(Self {
            binary,
            prefer_mp4a,
        })
    }
}

#[async_trait]
impl ThemeResolver for YtDlpResolver {
    async fn resolve(&self, url: &str) -> Result<Option<String>> {
        let output = Command::new(&self.binary)
            .arg("--dump-single-json")
            .arg("--no-download")
            .arg("--socket-timeout")
            .arg("10")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // yt-dlp prefixes expected extractor failures with "ERROR:"
            if stderr.contains("ERROR:") {
                info!("yt-dlp could not extract {url}: {}", stderr.trim());
            } else {
                warn!("yt-dlp failed unexpectedly for {url}: {}", stderr.trim());
            }
            return Ok(None);
        }

        let info: VideoInfo =
            serde_json::from_slice(&output.stdout).context("Failed to parse yt-dlp output")?;

        // playlists resolve to their first entry
        let video = match info.entries {
            Some(mut entries) if !entries.is_empty() => entries.remove(0),
            _ => info,
        };

        Ok(select_audio_url(&video.formats, self.prefer_mp4a))
    }
}

/// Pick the best audio-only stream from the extractor's format list.
///
/// The largest stream per codec is kept as a quality proxy, then the larger
/// of opus/mp4a wins unless the mp4a preference is set and an mp4a stream is
/// available.
fn select_audio_url(formats: &[Format], prefer_mp4a: bool) -> Option<String> {
    let mut opus: (u64, Option<&str>) = (0, None);
    let mut mp4a: (u64, Option<&str>) = (0, None);

    for format in formats {
        if !format.format.contains("audio only") {
            continue;
        }
        let Some(acodec) = format.acodec.as_deref() else {
            continue;
        };

        let slot = if acodec == "opus" {
            &mut opus
        } else if acodec.split('.').next() == Some("mp4a") {
            &mut mp4a
        } else {
            debug!("Unknown audio codec: {acodec}");
            continue;
        };

        let filesize = format.filesize.unwrap_or(0);
        if filesize > slot.0 {
            *slot = (filesize, format.url.as_deref());
        }
    }

    let mut audio_url = if opus.0 > 0 && opus.0 > mp4a.0 {
        opus.1
    } else if mp4a.0 > 0 && mp4a.0 > opus.0 {
        mp4a.1
    } else {
        None
    };

    if audio_url.is_some() && prefer_mp4a {
        if mp4a.1.is_some() {
            audio_url = mp4a.1;
        } else if opus.1.is_some() {
            audio_url = opus.1;
        }
    }

    audio_url.map(String::from)
}
