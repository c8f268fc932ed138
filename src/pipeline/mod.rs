//! The update pipeline: producers enqueue rating keys, a pool of workers
//! drains them.
//!
//! Workers re-resolve full item state at pull time, so a stale or duplicate
//! enqueue costs at most one redundant resolution pass — the applied-state
//! check keeps it from becoming a redundant upload. A failure while
//! processing one item is logged and never takes the worker down.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::context::AppContext;
use crate::media::{self, MediaKind, ThemeProvider};
use crate::plex::{Item, UploadSource};
use crate::resolve;
use crate::themedb::ThemeRecord;
use crate::types::{ItemType, RatingKey, MOVIE_AGENT, SUPPORTED_AGENTS};

/// Base URL for movie-database artwork referenced by collection records.
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";

/// Spawn the upload worker pool. Workers run until the queue closes.
pub fn spawn_workers(ctx: &Arc<AppContext>) -> Vec<JoinHandle<()>> {
    let count = ctx.config.themes.upload_workers.max(1);
    info!("Starting {count} upload workers");

    (0..count)
        .map(|id| {
            let ctx = ctx.clone();
            tokio::spawn(worker_loop(ctx, id))
        })
        .collect()
}

async fn worker_loop(ctx: Arc<AppContext>, worker_id: usize) {
    debug!("Upload worker {worker_id} started");

    while let Some(rating_key) = ctx.queue.next().await {
        if let Err(e) = update_item(&ctx, rating_key).await {
            error!("Unexpected error processing rating key {rating_key}: {e:#}");
        }
        ctx.queue.finish(rating_key);
    }

    debug!("Upload worker {worker_id} stopped");
}

/// Process a single item end to end: resolve its database identity, gate on
/// the existence cache, fetch the theme record, and drive the media upload
/// state machine.
pub async fn update_item(ctx: &AppContext, rating_key: RatingKey) -> Result<()> {
    let item = ctx.plex.item(rating_key).await?;

    debug!("Processing {} \"{}\" ({rating_key})", item.item_type, item.title);

    let identity = resolve::resolve(ctx, &item).await;
    let Some((db_type, database, agent, external_id)) = identity.complete() else {
        debug!(
            "No usable database identity for \"{}\", skipping",
            item.title
        );
        return Ok(());
    };

    if !ctx.cache.exists(db_type, database, external_id).await {
        debug!(
            "{} item does not exist in theme database, skipping: {} ({external_id})",
            item.item_type, item.title
        );
        return Ok(());
    }

    let record = match ctx.themedb.theme(db_type, database, external_id).await {
        Ok(record) => record,
        Err(e) => {
            error!("{rating_key}: Error retrieving data from theme database: {e:#}");
            return Ok(());
        }
    };

    debug!("Data found for {} \"{}\"", item.item_type, item.title);

    if item.item_type == ItemType::Collection {
        update_collection_metadata(ctx, &item, agent, &record).await?;
    }

    update_theme(ctx, &item, &record).await
}

/// Poster, art, and summary updates for collections.
async fn update_collection_metadata(
    ctx: &AppContext,
    item: &Item,
    agent: &str,
    record: &ThemeRecord,
) -> Result<()> {
    let themes = &ctx.config.themes;

    // only collections owned by the current movie agent are updated
    if agent != MOVIE_AGENT || !themes.update_collections {
        return Ok(());
    }

    if let Some(poster_path) = &record.poster_path {
        let url = format!("{TMDB_IMAGE_BASE}{poster_path}");
        media::add_media(ctx, item, MediaKind::Poster, poster_path, &UploadSource::Url(url))
            .await?;
    }

    if let Some(backdrop_path) = &record.backdrop_path {
        let url = format!("{TMDB_IMAGE_BASE}{backdrop_path}");
        media::add_media(ctx, item, MediaKind::Art, backdrop_path, &UploadSource::Url(url))
            .await?;
    }

    if item.is_locked("summary") && !themes.ignore_locked_fields {
        debug!("Not overwriting locked summary for collection: {}", item.title);
    } else if let Some(overview) = &record.overview {
        if item.summary.as_deref() != Some(overview.as_str()) {
            info!("Updating summary for collection: {}", item.title);
            if let Err(e) = ctx.plex.edit_summary(item.rating_key, overview, false).await {
                error!("{}: Error updating summary: {e:#}", item.rating_key);
            }
        }
    }

    Ok(())
}

async fn update_theme(ctx: &AppContext, item: &Item, record: &ThemeRecord) -> Result<()> {
    let themes = &ctx.config.themes;
    let rating_key = item.rating_key;

    if item.is_locked("theme") && !themes.ignore_locked_fields {
        debug!(
            "Not overwriting locked theme for {}: {}",
            item.item_type, item.title
        );
        return Ok(());
    }

    if !themes.overwrite_plex_themes
        && media::theme_provider(ctx, item).await == Some(ThemeProvider::Plex)
    {
        debug!(
            "Not overwriting host-provided theme for {}: {}",
            item.item_type, item.title
        );
        return Ok(());
    }

    let Some(theme_url) = record.youtube_theme_url.clone() else {
        info!(
            "{rating_key}: No theme song found for {} ({})",
            item.title,
            item.year.map(|y| y.to_string()).unwrap_or_default()
        );
        return Ok(());
    };

    // check the applied state before paying for extraction
    if media::already_satisfied(ctx, item, MediaKind::Theme, &theme_url) {
        info!(
            "Skipping theme for {} \"{}\" ({rating_key}), already up to date",
            item.item_type, item.title
        );
        return Ok(());
    }

    match ctx.resolver.resolve(&theme_url).await {
        Ok(Some(audio_url)) => {
            media::add_media(
                ctx,
                item,
                MediaKind::Theme,
                &theme_url,
                &UploadSource::Url(audio_url),
            )
            .await?;
        }
        Ok(None) => {
            info!("{rating_key}: No playable audio stream for {}", item.title);
        }
        Err(e) => {
            error!("{rating_key}: Error extracting audio from {theme_url}: {e:#}");
        }
    }

    Ok(())
}

/// Enumerate every item (and collection) in every supported library section.
pub async fn collect_rating_keys(ctx: &AppContext) -> Result<Vec<RatingKey>> {
    let sections = ctx.plex.sections().await?;
    let mut keys = Vec::new();

    for section in sections {
        if !SUPPORTED_AGENTS.contains(&section.agent.as_str()) {
            continue;
        }
        if !ctx.config.themes.agent_enabled(&section.agent) {
            debug!("Updates disabled for agent \"{}\"", section.agent);
            continue;
        }

        let mut items = match section.section_type.as_str() {
            "movie" => {
                let mut items = ctx.plex.section_items(section.id).await?;
                if ctx.config.themes.collection_support {
                    items.extend(ctx.plex.section_collections(section.id).await?);
                }
                items
            }
            "show" => ctx.plex.section_items(section.id).await?,
            _ => continue,
        };

        keys.extend(items.drain(..).map(|item| item.rating_key));
    }

    Ok(keys)
}

/// Scheduled full scan: refresh the existence cache, then enqueue the whole
/// library for the workers.
pub async fn scan_library(ctx: &AppContext) -> Result<()> {
    ctx.cache.refresh().await;

    let keys = collect_rating_keys(ctx).await?;
    let total = keys.len();
    let queued = keys
        .into_iter()
        .filter(|&key| ctx.queue.enqueue(key))
        .count();

    info!("Library scan queued {queued} of {total} items");
    Ok(())
}

/// One-shot scan for the CLI: process every item inline instead of through
/// the worker pool.
pub async fn scan_once(ctx: &AppContext) -> Result<()> {
    ctx.cache.refresh().await;

    let keys = collect_rating_keys(ctx).await?;
    info!("Processing {} items", keys.len());

    for key in keys {
        if let Err(e) = update_item(ctx, key).await {
            error!("Unexpected error processing rating key {key}: {e:#}");
        }
    }
    Ok(())
}
