//! Shared fixtures: a mock host server, a mock theme database, and a stub
//! audio resolver wired into a full `AppContext`.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use overture::config::Config;
use overture::context::AppContext;
use overture::extract::ThemeResolver;

/// Resolver that answers every extraction with a fixed audio URL.
pub struct StubResolver {
    pub audio_url: Option<String>,
}

#[async_trait]
impl ThemeResolver for StubResolver {
    async fn resolve(&self, _url: &str) -> anyhow::Result<Option<String>> {
        Ok(self.audio_url.clone())
    }
}

pub struct Harness {
    pub plex: MockServer,
    pub themedb: MockServer,
    pub ctx: Arc<AppContext>,
    _data_dir: tempfile::TempDir,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(mutate: impl FnOnce(&mut Config)) -> Self {
        Self::with_parts(mutate, Some("https://audio.example.com/stream")).await
    }

    /// Harness whose stub resolver fails to extract an audio stream.
    pub async fn without_audio() -> Self {
        Self::with_parts(|_| {}, None).await
    }

    async fn with_parts(mutate: impl FnOnce(&mut Config), audio_url: Option<&str>) -> Self {
        let plex = MockServer::start().await;
        let themedb = MockServer::start().await;
        let data_dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.plex.url = plex.uri();
        config.plex.token = "test-token".to_string();
        config.themedb.base_url = themedb.uri();
        config.themes.data_dir = data_dir.path().to_path_buf();
        mutate(&mut config);

        let resolver = Arc::new(StubResolver {
            audio_url: audio_url.map(String::from),
        });
        let ctx = AppContext::new(config, resolver).unwrap();

        Self {
            plex,
            themedb,
            ctx,
            _data_dir: data_dir,
        }
    }
}

/// Mount a one-page catalog for a database type.
pub async fn mount_catalog(themedb: &MockServer, db_type: &str, entries: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/{db_type}/pages.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pages": 1})))
        .mount(themedb)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/{db_type}/all_page_1.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries))
        .mount(themedb)
        .await;
}

/// Mount empty catalogs for every database type not under test.
pub async fn mount_empty_catalogs(themedb: &MockServer, db_types: &[&str]) {
    for db_type in db_types {
        Mock::given(method("GET"))
            .and(path(format!("/{db_type}/pages.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pages": 0})))
            .mount(themedb)
            .await;
    }
}

/// A movie item envelope as the host server serves it.
pub fn movie_envelope(
    rating_key: u32,
    title: &str,
    guids: &[&str],
    locked_fields: &[&str],
) -> Value {
    json!({
        "MediaContainer": {
            "Metadata": [{
                "ratingKey": rating_key.to_string(),
                "guid": format!("plex://movie/{rating_key}"),
                "type": "movie",
                "title": title,
                "year": 1995,
                "librarySectionID": 1,
                "Guid": guids.iter().map(|g| json!({"id": g})).collect::<Vec<_>>(),
                "Field": locked_fields
                    .iter()
                    .map(|f| json!({"name": f, "locked": true}))
                    .collect::<Vec<_>>(),
            }]
        }
    })
}

/// A collection item envelope.
pub fn collection_envelope(rating_key: u32, title: &str, summary: &str) -> Value {
    json!({
        "MediaContainer": {
            "Metadata": [{
                "ratingKey": rating_key.to_string(),
                "guid": format!("plex://collection/{rating_key}"),
                "type": "collection",
                "title": title,
                "librarySectionID": 1,
                "summary": summary,
            }]
        }
    })
}

/// Mount an item lookup on the host server.
pub async fn mount_item(plex: &MockServer, rating_key: u32, envelope: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/library/metadata/{rating_key}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope))
        .mount(plex)
        .await;
}

/// Mount an empty theme listing, so provider detection sees no themes.
pub async fn mount_empty_themes(plex: &MockServer, rating_key: u32) {
    Mock::given(method("GET"))
        .and(path(format!("/library/metadata/{rating_key}/themes")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"MediaContainer": {"Metadata": []}})),
        )
        .mount(plex)
        .await;
}

/// Mount field-lock edits (PUT on the item) as always succeeding.
pub async fn mount_edits(plex: &MockServer, rating_key: u32) {
    Mock::given(method("PUT"))
        .and(path(format!("/library/metadata/{rating_key}")))
        .respond_with(ResponseTemplate::new(200))
        .mount(plex)
        .await;
}

/// Mount the sections listing with one movie section owned by the current
/// movie agent.
pub async fn mount_movie_section(plex: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/library/sections"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaContainer": {
                "Directory": [{
                    "key": "1",
                    "title": "Movies",
                    "agent": "tv.plex.agents.movie",
                    "type": "movie",
                    "language": "en-US",
                }]
            }
        })))
        .mount(plex)
        .await;
}
