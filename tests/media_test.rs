//! Media upload state machine: skip logic, retries, and applied-state
//! bookkeeping, driven against a mock host server.

mod common;

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use common::Harness;
use overture::media::{self, MediaKind};
use overture::plex::{Item, UploadSource};
use overture::store::settings_fingerprint;
use overture::types::{ItemType, RatingKey};

const RK: u32 = 49915;
const THEME_URL: &str = "https://www.youtube.com/watch?v=theme";

fn movie(locked_fields: &[&str]) -> Item {
    Item {
        rating_key: RatingKey::new(RK),
        guid: format!("plex://movie/{RK}"),
        item_type: ItemType::Movie,
        title: "GoldenEye".to_string(),
        year: Some(1995),
        library_section_id: Some(1),
        summary: None,
        theme: None,
        guids: vec!["tmdb://710".to_string()],
        locked_fields: locked_fields.iter().map(|s| s.to_string()).collect(),
    }
}

fn audio_source() -> UploadSource {
    UploadSource::Url("https://audio.example.com/stream".to_string())
}

#[tokio::test]
async fn satisfied_record_skips_upload() {
    let harness = Harness::new().await;
    let ctx = &harness.ctx;

    let fingerprint = settings_fingerprint(&ctx.config);
    ctx.store
        .merge(ItemType::Movie, RatingKey::new(RK), |record| {
            record.settings_hash = Some(fingerprint);
            record.youtube_theme_url = Some(THEME_URL.to_string());
        })
        .unwrap();

    Mock::given(method("POST"))
        .and(path(format!("/library/metadata/{RK}/themes")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.plex)
        .await;

    let uploaded = media::add_media(ctx, &movie(&[]), MediaKind::Theme, THEME_URL, &audio_source())
        .await
        .unwrap();

    assert!(!uploaded);
}

#[tokio::test]
async fn invoking_twice_uploads_once() {
    let harness = Harness::new().await;
    let ctx = &harness.ctx;

    Mock::given(method("POST"))
        .and(path(format!("/library/metadata/{RK}/themes")))
        .and(query_param("url", "https://audio.example.com/stream"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.plex)
        .await;
    common::mount_edits(&harness.plex, RK).await;

    let item = movie(&[]);
    let first = media::add_media(ctx, &item, MediaKind::Theme, THEME_URL, &audio_source())
        .await
        .unwrap();
    let second = media::add_media(ctx, &item, MediaKind::Theme, THEME_URL, &audio_source())
        .await
        .unwrap();

    assert!(first);
    assert!(!second);
}

#[tokio::test]
async fn fingerprint_change_forces_reupload() {
    let harness = Harness::new().await;
    let ctx = &harness.ctx;

    // record from a run with different output-affecting settings
    ctx.store
        .merge(ItemType::Movie, RatingKey::new(RK), |record| {
            record.settings_hash = Some("stale-fingerprint".to_string());
            record.youtube_theme_url = Some(THEME_URL.to_string());
        })
        .unwrap();

    Mock::given(method("POST"))
        .and(path(format!("/library/metadata/{RK}/themes")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.plex)
        .await;
    common::mount_edits(&harness.plex, RK).await;

    let uploaded = media::add_media(ctx, &movie(&[]), MediaKind::Theme, THEME_URL, &audio_source())
        .await
        .unwrap();
    assert!(uploaded);

    let record = ctx.store.load(ItemType::Movie, RatingKey::new(RK));
    assert_eq!(
        record.settings_hash.as_deref(),
        Some(settings_fingerprint(&ctx.config).as_str())
    );
}

#[tokio::test]
async fn locked_field_is_respected() {
    let harness = Harness::new().await;

    Mock::given(method("POST"))
        .and(path(format!("/library/metadata/{RK}/themes")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&harness.plex)
        .await;

    let uploaded = media::add_media(
        &harness.ctx,
        &movie(&["theme"]),
        MediaKind::Theme,
        THEME_URL,
        &audio_source(),
    )
    .await
    .unwrap();

    assert!(!uploaded);
}

#[tokio::test]
async fn lock_override_uploads_anyway() {
    let harness = Harness::with_config(|config| {
        config.themes.ignore_locked_fields = true;
    })
    .await;

    Mock::given(method("POST"))
        .and(path(format!("/library/metadata/{RK}/themes")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.plex)
        .await;
    common::mount_edits(&harness.plex, RK).await;

    let uploaded = media::add_media(
        &harness.ctx,
        &movie(&["theme"]),
        MediaKind::Theme,
        THEME_URL,
        &audio_source(),
    )
    .await
    .unwrap();

    assert!(uploaded);
}

#[tokio::test]
async fn failing_upload_stops_at_the_retry_ceiling() {
    let harness = Harness::with_config(|config| {
        config.themes.upload_retries_max = 1;
    })
    .await;

    // initial attempt + 1 retry, then give up
    Mock::given(method("POST"))
        .and(path(format!("/library/metadata/{RK}/themes")))
        .respond_with(ResponseTemplate::new(500).set_body_string("busy"))
        .expect(2)
        .mount(&harness.plex)
        .await;

    let uploaded = media::add_media(
        &harness.ctx,
        &movie(&[]),
        MediaKind::Theme,
        THEME_URL,
        &audio_source(),
    )
    .await
    .unwrap();

    assert!(!uploaded);
    // failure leaves no applied state behind
    let record = harness.ctx.store.load(ItemType::Movie, RatingKey::new(RK));
    assert!(record.settings_hash.is_none());
}

#[tokio::test]
async fn successful_upload_records_state_and_clears_the_lock() {
    let harness = Harness::new().await;
    let ctx = &harness.ctx;

    Mock::given(method("POST"))
        .and(path(format!("/library/metadata/{RK}/posters")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.plex)
        .await;
    // the unlock edit for the poster field
    Mock::given(method("PUT"))
        .and(path(format!("/library/metadata/{RK}")))
        .and(query_param("thumb.locked", "0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&harness.plex)
        .await;

    let uploaded = media::add_media(
        ctx,
        &movie(&[]),
        MediaKind::Poster,
        "/poster.jpg",
        &UploadSource::Url("https://image.tmdb.org/t/p/original/poster.jpg".to_string()),
    )
    .await
    .unwrap();

    assert!(uploaded);
    let record = ctx.store.load(ItemType::Movie, RatingKey::new(RK));
    assert_eq!(record.poster_url.as_deref(), Some("/poster.jpg"));
    assert_eq!(
        record.settings_hash.as_deref(),
        Some(settings_fingerprint(&ctx.config).as_str())
    );
}
