//! WebSocket subscription to the host server's activity feed.
//!
//! The server pushes timeline entries for everything happening in the
//! library; the listener reacts only to "metadata update finished" entries
//! for supported item types and enqueues the affected rating key. The
//! connection is re-established with a short delay whenever it drops.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::{PlexConfig, ThemesConfig};
use crate::context::{AppContext, UpdateQueue};
use crate::types::{ItemType, RatingKey};

/// Timeline state for "library metadata update finished".
const STATE_UPDATE_FINISHED: u32 = 5;

/// Originating component for library metadata updates.
const LIBRARY_IDENTIFIER: &str = "com.plexapp.plugins.library";

/// Delay before reconnecting a dropped feed.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "NotificationContainer")]
    container: NotificationContainer,
}

#[derive(Debug, Deserialize)]
struct NotificationContainer {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(rename = "TimelineEntry", default)]
    timeline: Vec<TimelineEntry>,
}

#[derive(Debug, Deserialize)]
struct TimelineEntry {
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    state: u32,
    #[serde(rename = "type", default)]
    type_code: u32,
    #[serde(rename = "itemID")]
    item_id: Option<NumOrStr>,
    #[serde(default)]
    title: String,
}

/// The server reports `itemID` as a string in some releases and a number in
/// others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(u32),
    Str(String),
}

impl NumOrStr {
    fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.parse().ok(),
        }
    }
}

/// Spawn the listener task. Runs until the process exits, reconnecting on
/// any feed error.
pub fn spawn(ctx: Arc<AppContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listen(&ctx).await {
                Ok(()) => info!("Activity feed closed by server"),
                Err(e) => warn!("Activity feed error: {e:#}"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

async fn listen(ctx: &AppContext) -> Result<()> {
    let url = websocket_url(&ctx.config.plex)?;
    let (stream, _response) = connect_async(&url)
        .await
        .context("Failed to connect to the server activity feed")?;

    info!("Connected to server activity feed");

    let (_write, mut read) = stream.split();
    while let Some(message) = read.next().await {
        match message.context("Activity feed read failed")? {
            Message::Text(text) => handle_message(&ctx.config.themes, &ctx.queue, &text),
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

/// Derive the notification WebSocket URL from the configured server URL.
fn websocket_url(config: &PlexConfig) -> Result<String> {
    let base = config.url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        anyhow::bail!("Unsupported server URL scheme: {}", config.url);
    };
    Ok(format!(
        "{ws_base}/:/websockets/notifications?X-Plex-Token={}",
        config.token
    ))
}

/// Process one feed message, enqueuing rating keys for qualifying entries.
fn handle_message(themes: &ThemesConfig, queue: &UpdateQueue, text: &str) {
    let notification: Notification = match serde_json::from_str(text) {
        Ok(n) => n,
        Err(_) => return, // other feed types use shapes we don't care about
    };

    if notification.container.kind != "timeline" {
        return;
    }

    for entry in notification.container.timeline {
        let supported = match ItemType::from_type_code(entry.type_code) {
            Some(ItemType::Movie) => themes.movie_support,
            Some(ItemType::Show) => themes.series_support,
            _ => false,
        };

        if !supported
            || entry.state != STATE_UPDATE_FINISHED
            || entry.identifier != LIBRARY_IDENTIFIER
        {
            continue;
        }

        let Some(item_id) = entry.item_id.as_ref().and_then(NumOrStr::as_u32) else {
            continue;
        };

        let rating_key = RatingKey::new(item_id);
        if queue.enqueue(rating_key) {
            debug!(
                "Queued update for \"{}\" (rating key {rating_key})",
                entry.title
            );
        }
    }
}
