//! One-time migrations between overture releases.
//!
//! Completion flags live in a single JSON document guarded by its own lock,
//! so a migration runs at most once per installation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::context::AppContext;
use crate::types::SUPPORTED_AGENTS;

/// Earlier releases left the theme field locked after uploading, which
/// blocked all future automated updates. This migration clears those locks.
pub const LOCKED_THEMES: &str = "locked_themes";

pub struct MigrationTracker {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MigrationTracker {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("migration_status.json"),
            lock: Mutex::new(()),
        }
    }

    fn read_status(&self) -> BTreeMap<String, bool> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        }
    }

    pub fn is_complete(&self, key: &str) -> bool {
        let _guard = self.lock.lock();
        self.read_status().get(key).copied().unwrap_or(false)
    }

    pub fn mark_complete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut status = self.read_status();
        status.insert(key.to_string(), true);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&status)?)
            .with_context(|| format!("Failed to write migration status {:?}", self.path))?;
        Ok(())
    }
}

/// Run every migration that has not completed yet. Failures are logged and
/// leave the flag unset so the migration is retried on the next start.
pub async fn run_pending(ctx: &Arc<AppContext>) {
    if !ctx.migrations.is_complete(LOCKED_THEMES) {
        match migrate_locked_themes(ctx).await {
            Ok(()) => {
                if let Err(e) = ctx.migrations.mark_complete(LOCKED_THEMES) {
                    error!("Failed to record migration completion: {e:#}");
                }
            }
            Err(e) => error!("Migration \"{LOCKED_THEMES}\" failed: {e:#}"),
        }
    }
}

async fn migrate_locked_themes(ctx: &Arc<AppContext>) -> Result<()> {
    info!("Unlocking theme fields locked by earlier releases");

    let sections = ctx.plex.sections().await?;
    let mut unlocked = 0usize;

    for section in sections {
        if !SUPPORTED_AGENTS.contains(&section.agent.as_str()) {
            continue;
        }

        let mut items = ctx.plex.section_items(section.id).await?;
        if section.section_type == "movie" {
            items.extend(ctx.plex.section_collections(section.id).await?);
        }

        for item in items {
            if !item.is_locked("theme") {
                continue;
            }
            match ctx.plex.set_field_lock(item.rating_key, "theme", false).await {
                Ok(()) => unlocked += 1,
                Err(e) => error!("{}: Error unlocking theme field: {e:#}", item.rating_key),
            }
        }
    }

    info!("Unlocked {unlocked} theme fields");
    Ok(())
}
