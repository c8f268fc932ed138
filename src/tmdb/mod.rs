//! Movie-database lookups through the host server's proxy service.
//!
//! The host exposes a keyless proxy to the movie database at
//! `/services/tmdb?uri=`, which is enough for the two lookups overture
//! needs: translating external (imdb/tvdb) IDs into canonical IDs, and
//! searching collections by name.
//!
//! Requests are token-bucket rate limited so a full library scan cannot
//! hammer the proxy.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// External databases the find endpoint can translate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalDb {
    Imdb,
    Tvdb,
}

impl ExternalDb {
    fn source_param(&self) -> &'static str {
        match self {
            Self::Imdb => "imdb_id",
            Self::Tvdb => "tvdb_id",
        }
    }
}

/// Which result list of a find response to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindKind {
    Movie,
    Tv,
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    movie_results: Vec<FindResult>,
    #[serde(default)]
    tv_results: Vec<FindResult>,
}

#[derive(Debug, Deserialize)]
struct FindResult {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct CollectionSearchResponse {
    #[serde(default)]
    results: Vec<CollectionResult>,
}

#[derive(Debug, Deserialize)]
struct CollectionResult {
    id: u64,
    #[serde(default)]
    name: String,
}

pub struct TmdbClient {
    client: reqwest::Client,
    proxy_base: String,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl TmdbClient {
    /// Create a client talking through the host's proxy. `server_url` is the
    /// host server base URL.
    pub fn new(server_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client for the movie database proxy")?;

        let quota = Quota::per_second(NonZeroU32::new(2).unwrap());

        Ok(Self {
            client,
            proxy_base: format!("{}/services/tmdb?uri=", server_url.trim_end_matches('/')),
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, uri: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.proxy_base, uri);
        debug!(url = %url, "Movie database proxy request");

        self.client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Movie database request failed: {uri}"))?
            .error_for_status()
            .with_context(|| format!("Movie database returned error: {uri}"))?
            .json()
            .await
            .with_context(|| format!("Failed to parse movie database response: {uri}"))
    }

    /// Translate an external ID into the movie database's canonical ID.
    ///
    /// Returns `Ok(None)` when the database has no match.
    pub async fn find_by_external_id(
        &self,
        external_id: &str,
        database: ExternalDb,
        kind: FindKind,
    ) -> Result<Option<u64>> {
        let uri = format!(
            "/find/{}?external_source={}",
            urlencoded(external_id),
            database.source_param()
        );

        let response: FindResponse = self.get_json(&uri).await?;
        let results = match kind {
            FindKind::Movie => &response.movie_results,
            FindKind::Tv => &response.tv_results,
        };

        Ok(results.first().map(|r| r.id))
    }

    /// Search for a collection by title, scoped to a library language.
    ///
    /// Matches are accepted with or without the trailing "Collection" the
    /// movie database appends to collection names.
    pub async fn search_collection(&self, title: &str, language: &str) -> Result<Option<u64>> {
        // the proxy rejects encoded spaces in the query, dashes work
        let query = urlencoded(&title.replace(' ', "-"));
        let uri = format!("/search/collection?query={query}&language={language}");

        let response: CollectionSearchResponse = self.get_json(&uri).await?;

        let wanted = title.to_lowercase();
        let wanted_suffixed = format!("{wanted} collection");

        Ok(response
            .results
            .iter()
            .find(|r| {
                let name = r.name.to_lowercase();
                name == wanted || name == wanted_suffixed
            })
            .map(|r| r.id))
    }
}

/// Minimal percent-encoding for path/query fragments sent through the proxy.
fn urlencoded(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            _ => {
                out.push('%');
                out.push(char::from(HEX[(b >> 4) as usize]));
                out.push(char::from(HEX[(b & 0x0f) as usize]));
            }
        }
    }
    out
}

const HEX: [u8; 16] = *b"0123456789ABCDEF";
