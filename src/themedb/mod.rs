//! Client for the community theme database.
//!
//! The database is published as static JSON: a `pages.json` page count plus
//! `all_page_{n}.json` catalog pages per database type, and one detail
//! document per `(type, database, id)` triple.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::{Database, DbType};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Detail record for one catalog entry. Everything is optional; movie and
/// show records usually carry only the theme URL, collection records may add
/// artwork paths and a summary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThemeRecord {
    #[serde(default)]
    pub youtube_theme_url: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PagesDoc {
    pages: u32,
}

/// One row of a catalog page. The id fields present depend on the database
/// type, so unknown keys are kept as a raw map.
pub type CatalogEntry = HashMap<String, serde_json::Value>;

pub struct ThemeDbClient {
    client: reqwest::Client,
    base_url: String,
}

impl ThemeDbClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for the theme database")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        self.client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Theme database request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("Theme database returned error: {url}"))?
            .json()
            .await
            .with_context(|| format!("Failed to parse theme database response: {url}"))
    }

    /// Number of catalog pages for a database type.
    pub async fn page_count(&self, db_type: DbType) -> Result<u32> {
        let doc: PagesDoc = self.get_json(&format!("{}/pages.json", db_type)).await?;
        Ok(doc.pages)
    }

    /// Fetch one catalog page (1-based).
    pub async fn catalog_page(&self, db_type: DbType, page: u32) -> Result<Vec<CatalogEntry>> {
        self.get_json(&format!("{}/all_page_{}.json", db_type, page))
            .await
    }

    /// Fetch the detail record for a single entry.
    pub async fn theme(
        &self,
        db_type: DbType,
        database: Database,
        id: &str,
    ) -> Result<ThemeRecord> {
        self.get_json(&format!("{}/{}/{}.json", db_type, database, id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_record_tolerates_missing_fields() {
        let record: ThemeRecord = serde_json::from_str(r#"{"id": 710}"#).unwrap();
        assert!(record.youtube_theme_url.is_none());
        assert!(record.overview.is_none());

        let record: ThemeRecord = serde_json::from_str(
            r#"{
                "id": 645,
                "youtube_theme_url": "https://www.youtube.com/watch?v=abc",
                "poster_path": "/poster.jpg",
                "backdrop_path": "/backdrop.jpg",
                "overview": "A film franchise."
            }"#,
        )
        .unwrap();
        assert_eq!(
            record.youtube_theme_url.as_deref(),
            Some("https://www.youtube.com/watch?v=abc")
        );
        assert_eq!(record.poster_path.as_deref(), Some("/poster.jpg"));
    }
}
