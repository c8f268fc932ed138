//! Media upload state machine.
//!
//! For each (item, media kind) pair the pipeline lands in one of three
//! states: **locked** (a user pinned the field — skip unless overridden),
//! **satisfied** (the applied-state record matches what would be uploaded —
//! skip), or **needs upload**. Uploads retry with exponential backoff up to
//! the configured ceiling; a success records the new applied state and
//! clears the lock flag the host sets automatically on uploaded media.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info};

use crate::config::ThemesConfig;
use crate::context::AppContext;
use crate::plex::{Item, UploadSource};
use crate::store::{self, ItemRecord};
use crate::types::RatingKey;

/// The three media kinds the host accepts uploads for, with the per-kind
/// naming the host APIs and the applied-state records use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Art,
    Poster,
    Theme,
}

impl MediaKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Art => "art",
            Self::Poster => "poster",
            Self::Theme => "theme",
        }
    }

    /// Field name carrying the host's lock flag for this kind.
    pub fn lock_field(&self) -> &'static str {
        match self {
            Self::Art => "art",
            Self::Poster => "thumb",
            Self::Theme => "theme",
        }
    }

    /// Directory name under the host's per-item `Uploads` bundle.
    pub fn upload_dir(&self) -> &'static str {
        match self {
            Self::Art => "art",
            Self::Poster => "posters",
            Self::Theme => "themes",
        }
    }

    fn remove_unused(&self, themes: &ThemesConfig) -> bool {
        match self {
            Self::Art => themes.remove_unused_art,
            Self::Poster => themes.remove_unused_posters,
            Self::Theme => themes.remove_unused_themes,
        }
    }

    /// The applied-state key recording the last uploaded source id.
    pub fn source_id<'a>(&self, record: &'a ItemRecord) -> Option<&'a str> {
        match self {
            Self::Art => record.art_url.as_deref(),
            Self::Poster => record.poster_url.as_deref(),
            Self::Theme => record.youtube_theme_url.as_deref(),
        }
    }

    fn set_source_id(&self, record: &mut ItemRecord, source_id: String) {
        match self {
            Self::Art => record.art_url = Some(source_id),
            Self::Poster => record.poster_url = Some(source_id),
            Self::Theme => record.youtube_theme_url = Some(source_id),
        }
    }
}

/// Where an item's current theme came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeProvider {
    /// Locally supplied media.
    User,
    /// Provided by the host server itself.
    Plex,
    /// Uploaded by overture.
    Overture,
    Other(String),
}

/// Whether the stored applied state already covers this exact upload.
fn is_satisfied(
    record: &ItemRecord,
    fingerprint: &str,
    kind: MediaKind,
    source_id: &str,
) -> bool {
    record.settings_hash.as_deref() == Some(fingerprint)
        && kind.source_id(record) == Some(source_id)
}

/// Satisfied-state check against the item's current record, for callers that
/// want to skip before paying for extraction.
pub(crate) fn already_satisfied(
    ctx: &AppContext,
    item: &Item,
    kind: MediaKind,
    source_id: &str,
) -> bool {
    let fingerprint = store::settings_fingerprint(&ctx.config);
    let record = ctx.store.load(item.item_type, item.rating_key);
    is_satisfied(&record, &fingerprint, kind, source_id)
}

/// Apply one piece of media to an item, honoring locks and the applied-state
/// record. Returns true only when an upload actually happened.
///
/// `source_id` is the stable identifier of the media source (the theme video
/// URL, or the artwork path) recorded for future skip decisions; `source` is
/// what the host is told to ingest.
pub async fn add_media(
    ctx: &AppContext,
    item: &Item,
    kind: MediaKind,
    source_id: &str,
    source: &UploadSource,
) -> Result<bool> {
    let themes = &ctx.config.themes;

    if item.is_locked(kind.lock_field()) && !themes.ignore_locked_fields {
        info!(
            "Not overwriting locked {} for {}: {}",
            kind.name(),
            item.item_type,
            item.title
        );
        return Ok(false);
    }

    let fingerprint = store::settings_fingerprint(&ctx.config);
    let record = ctx.store.load(item.item_type, item.rating_key);

    if is_satisfied(&record, &fingerprint, kind, source_id) {
        info!(
            "Skipping {} for {} \"{}\" ({}), already up to date",
            kind.name(),
            item.item_type,
            item.title,
            item.rating_key
        );
        return Ok(false);
    }

    if kind.remove_unused(themes) {
        remove_uploaded_media(ctx, item, kind);
    }

    info!(
        "Uploading {} for {} \"{}\" ({})",
        kind.name(),
        item.item_type,
        item.title,
        item.rating_key
    );

    if !upload_with_retry(ctx, item.rating_key, kind, source).await {
        debug!(
            "Could not upload {} for {} \"{}\" ({})",
            kind.name(),
            item.item_type,
            item.title,
            item.rating_key
        );
        return Ok(false);
    }

    ctx.store.merge(item.item_type, item.rating_key, |record| {
        record.settings_hash = Some(fingerprint);
        kind.set_source_id(record, source_id.to_string());
    })?;

    // the host locks a field whenever media is uploaded to it; clear the
    // lock so future automated updates aren't blocked by our own upload
    if let Err(e) = ctx
        .plex
        .set_field_lock(item.rating_key, kind.lock_field(), false)
        .await
    {
        error!("{}: Error unlocking {} field: {e:#}", item.rating_key, kind.name());
    }

    Ok(true)
}

/// Drive the host upload primitive with bounded retry.
///
/// A failing upload is attempted `1 + upload_retries_max` times with
/// `2^attempt` seconds between attempts.
async fn upload_with_retry(
    ctx: &AppContext,
    rating_key: RatingKey,
    kind: MediaKind,
    source: &UploadSource,
) -> bool {
    let retries_max = ctx.config.themes.upload_retries_max;
    let mut attempt = 0u32;

    loop {
        let result = match kind {
            MediaKind::Art => ctx.plex.upload_art(rating_key, source).await,
            MediaKind::Poster => ctx.plex.upload_poster(rating_key, source).await,
            MediaKind::Theme => ctx.plex.upload_theme(rating_key, source).await,
        };

        match result {
            Ok(()) => return true,
            Err(e) => {
                error!("{rating_key}: Error uploading {}: {e:#}", kind.name());
                if attempt >= retries_max {
                    return false;
                }
                let backoff = Duration::from_secs(1 << attempt);
                error!("{rating_key}: Trying again in {}s", backoff.as_secs());
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

/// Delete the host-side upload directory for a kind, when overture has
/// filesystem access to the host's metadata tree.
fn remove_uploaded_media(ctx: &AppContext, item: &Item, kind: MediaKind) {
    let Some(metadata_dir) = &ctx.config.plex.metadata_dir else {
        return;
    };

    let path = store::media_upload_path(metadata_dir, item.item_type, &item.guid, kind.upload_dir());
    if path.is_dir() {
        if let Err(e) = std::fs::remove_dir_all(&path) {
            error!("Error removing uploaded {} at {:?}: {e}", kind.name(), path);
        }
    }
}

/// Prefixes of host-generated theme rating keys, which identify themes the
/// host provided itself.
const PLEX_THEME_KEY_PREFIXES: [&str; 3] = [
    "metadata://themes/tv.plex.agents.movies_",
    "metadata://themes/tv.plex.agents.series_",
    "metadata://themes/com.plexapp.agents.plexthememusic_",
];

/// Determine who supplied the item's currently selected theme.
pub async fn theme_provider(ctx: &AppContext, item: &Item) -> Option<ThemeProvider> {
    let entries = match ctx.plex.themes(item.rating_key).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Could not list themes for \"{}\": {e:#}", item.title);
            return None;
        }
    };

    if entries.is_empty() {
        debug!("No themes found for item: {}", item.title);
        return None;
    }

    let selected = entries.iter().find(|e| e.selected)?;

    let provider = match selected.provider.as_deref() {
        Some("local") | Some("com.plexapp.agents.localmedia") => Some(ThemeProvider::User),
        Some("com.plexapp.agents.plexthememusic") => Some(ThemeProvider::Plex),
        Some(other) => Some(ThemeProvider::Other(other.to_string())),
        // current agents don't report a provider; host-generated themes are
        // recognizable by their rating key prefix instead
        None => PLEX_THEME_KEY_PREFIXES
            .iter()
            .any(|prefix| selected.rating_key.starts_with(prefix))
            .then_some(ThemeProvider::Plex),
    };

    provider.or_else(|| {
        let record = ctx.store.load(item.item_type, item.rating_key);
        (record != ItemRecord::default()).then_some(ThemeProvider::Overture)
    })
}
