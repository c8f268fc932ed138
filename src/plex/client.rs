//! HTTP client for the host media server.
//!
//! Metadata agents cannot attach theme music to movies through the agent
//! callback surface, so everything goes through the server's own HTTP API:
//! library enumeration, item lookup, media upload, and field-lock edits.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;

use super::types::{
    DirectoryContainer, Envelope, Item, MetadataContainer, Section, ThemeEntry,
    ThemeListingContainer,
};
use crate::config::PlexConfig;
use crate::types::RatingKey;

pub struct PlexClient {
    client: Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

impl PlexClient {
    pub fn new(config: &PlexConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .context("Failed to build HTTP client for the Plex server")?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("X-Plex-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", path))?
            .error_for_status()
            .with_context(|| format!("Server returned error for {}", path))?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response for {}", path))
    }

    /// Check that the server is reachable and the token is accepted.
    pub async fn test_connection(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.url("/identity"))
            .header("X-Plex-Token", &self.token)
            .send()
            .await
            .context("Failed to reach the Plex server")?;
        Ok(response.status().is_success())
    }

    /// All library sections on the server.
    pub async fn sections(&self) -> Result<Vec<Section>> {
        let envelope: Envelope<DirectoryContainer> = self.get_json("/library/sections").await?;
        Ok(envelope
            .media_container
            .directories
            .into_iter()
            .filter_map(|d| d.into_section())
            .collect())
    }

    /// Look up a single section by its numeric id.
    pub async fn section(&self, id: u32) -> Result<Section> {
        let sections = self.sections().await?;
        sections
            .into_iter()
            .find(|s| s.id == id)
            .with_context(|| format!("No library section with id {}", id))
    }

    /// All items in a section, including cross-reference guids.
    pub async fn section_items(&self, section_id: u32) -> Result<Vec<Item>> {
        let path = format!("/library/sections/{}/all?includeGuids=1", section_id);
        let envelope: Envelope<MetadataContainer> = self.get_json(&path).await?;
        Ok(envelope
            .media_container
            .metadata
            .into_iter()
            .filter_map(|m| m.into_item())
            .collect())
    }

    /// All collections in a section.
    pub async fn section_collections(&self, section_id: u32) -> Result<Vec<Item>> {
        let path = format!("/library/sections/{}/collections", section_id);
        let envelope: Envelope<MetadataContainer> = self.get_json(&path).await?;
        Ok(envelope
            .media_container
            .metadata
            .into_iter()
            .filter_map(|m| m.into_item())
            .collect())
    }

    /// Fetch a single item by rating key.
    pub async fn item(&self, rating_key: RatingKey) -> Result<Item> {
        let path = format!("/library/metadata/{}?includeGuids=1", rating_key);
        let envelope: Envelope<MetadataContainer> = self.get_json(&path).await?;
        envelope
            .media_container
            .metadata
            .into_iter()
            .next()
            .and_then(|m| m.into_item())
            .with_context(|| format!("No item with rating key {}", rating_key))
    }

    /// List the theme media attached to an item.
    pub async fn themes(&self, rating_key: RatingKey) -> Result<Vec<ThemeEntry>> {
        let path = format!("/library/metadata/{}/themes", rating_key);
        let envelope: Envelope<ThemeListingContainer> = self.get_json(&path).await?;
        Ok(envelope
            .media_container
            .metadata
            .into_iter()
            .map(|e| e.into_entry())
            .collect())
    }

    async fn upload(
        &self,
        rating_key: RatingKey,
        endpoint: &str,
        source: &UploadSource,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let path = format!("/library/metadata/{}/{}", rating_key, endpoint);
        let mut request = self
            .client
            .post(self.url(&path))
            .header("X-Plex-Token", &self.token);

        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        request = match source {
            UploadSource::Url(url) => request.query(&[("url", url.as_str())]),
            UploadSource::File(file) => {
                let bytes = tokio::fs::read(file)
                    .await
                    .with_context(|| format!("Failed to read media file {:?}", file))?;
                request.body(bytes)
            }
        };

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to POST {}", path))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Upload to {} rejected ({}): {}", path, status, body);
        }
        Ok(())
    }

    /// Upload a theme. The server can take a while to ingest audio, so this
    /// uses the configured timeout rather than the client default.
    pub async fn upload_theme(&self, rating_key: RatingKey, source: &UploadSource) -> Result<()> {
        self.upload(rating_key, "themes", source, Some(self.timeout))
            .await
    }

    pub async fn upload_poster(&self, rating_key: RatingKey, source: &UploadSource) -> Result<()> {
        self.upload(rating_key, "posters", source, None).await
    }

    pub async fn upload_art(&self, rating_key: RatingKey, source: &UploadSource) -> Result<()> {
        self.upload(rating_key, "arts", source, None).await
    }

    async fn edit(&self, rating_key: RatingKey, params: &[(String, String)]) -> Result<()> {
        let path = format!("/library/metadata/{}", rating_key);
        let response = self
            .client
            .put(self.url(&path))
            .header("X-Plex-Token", &self.token)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Failed to PUT {}", path))?;

        if !response.status().is_success() {
            anyhow::bail!("Edit of {} rejected ({})", path, response.status());
        }
        Ok(())
    }

    /// Replace an item's summary text.
    pub async fn edit_summary(
        &self,
        rating_key: RatingKey,
        summary: &str,
        locked: bool,
    ) -> Result<()> {
        self.edit(
            rating_key,
            &[
                ("summary.value".to_string(), summary.to_string()),
                ("summary.locked".to_string(), lock_flag(locked)),
            ],
        )
        .await
    }

    /// Set or clear the user-lock flag on a field.
    pub async fn set_field_lock(
        &self,
        rating_key: RatingKey,
        field: &str,
        lock: bool,
    ) -> Result<()> {
        self.edit(
            rating_key,
            &[(format!("{}.locked", field), lock_flag(lock))],
        )
        .await
    }
}

fn lock_flag(locked: bool) -> String {
    if locked { "1" } else { "0" }.to_string()
}

/// Payload for a media upload: either a remote URL the server fetches itself,
/// or a local file pushed as the request body.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Url(String),
    File(std::path::PathBuf),
}
