//! Local applied-state records.
//!
//! One small JSON document per library item records what overture last
//! uploaded (settings fingerprint plus per-kind source identifiers). The
//! record is the idempotence contract: when both the fingerprint and the
//! source id match, the item is already satisfied and no upload happens.
//!
//! Records are merged over prior state on write and are never deleted
//! automatically.

pub mod migrations;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::types::{ItemType, RatingKey};

/// Keys written by old releases, stripped whenever a record is rewritten.
const LEGACY_KEYS: [&str; 1] = ["downloaded_timestamp"];

/// Per-item applied-state document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ItemRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube_theme_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_url: Option<String>,

    /// Keys this release doesn't know about; preserved across writes except
    /// for recognized legacy keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ItemRecord {
    fn strip_legacy_keys(&mut self) {
        for key in LEGACY_KEYS {
            self.extra.remove(key);
        }
    }
}

pub struct StateStore {
    data_dir: PathBuf,
}

impl StateStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn record_path(&self, item_type: ItemType, rating_key: RatingKey) -> PathBuf {
        self.data_dir
            .join("data")
            .join(item_type.metadata_dir())
            .join(format!("{rating_key}.json"))
    }

    /// Load the record for an item, or an empty record when none exists.
    pub fn load(&self, item_type: ItemType, rating_key: RatingKey) -> ItemRecord {
        let path = self.record_path(item_type, rating_key);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Corrupt applied-state record {:?}: {e}", path);
                ItemRecord::default()
            }),
            Err(_) => ItemRecord::default(),
        }
    }

    /// Merge changes into an item's record and persist it.
    pub fn merge(
        &self,
        item_type: ItemType,
        rating_key: RatingKey,
        apply: impl FnOnce(&mut ItemRecord),
    ) -> Result<()> {
        let mut record = self.load(item_type, rating_key);
        record.strip_legacy_keys();
        apply(&mut record);

        let path = self.record_path(item_type, rating_key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write applied-state record {:?}", path))?;
        Ok(())
    }
}

/// Fingerprint of the preferences that affect uploaded output.
///
/// Any change to these invalidates every "already satisfied" record, forcing
/// a re-upload pass across the library.
pub fn settings_fingerprint(config: &Config) -> String {
    #[derive(Serialize)]
    struct FingerprintInputs {
        prefer_mp4a_codec: bool,
        plexapi_timeout: u64,
    }

    let inputs = FingerprintInputs {
        prefer_mp4a_codec: config.themes.prefer_mp4a_codec,
        plexapi_timeout: config.plex.timeout_secs,
    };

    let encoded = serde_json::to_vec(&inputs).expect("fingerprint inputs serialize");
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    hex::encode(hasher.finalize())
}

/// Path of the host-side upload directory for an item and media kind.
///
/// The host stores uploads under a bundle directory derived from the SHA-1
/// of the item guid; this is only used when overture runs on the same
/// machine and stale-upload removal is enabled.
pub fn media_upload_path(
    metadata_dir: &Path,
    item_type: ItemType,
    guid: &str,
    upload_dir: &str,
) -> PathBuf {
    use sha1::{Digest as _, Sha1};

    let mut hasher = Sha1::new();
    hasher.update(guid.as_bytes());
    let hash = hex::encode(hasher.finalize());

    metadata_dir
        .join(item_type.metadata_dir())
        .join(&hash[..1])
        .join(format!("{}.bundle", &hash[1..]))
        .join("Uploads")
        .join(upload_dir)
}
