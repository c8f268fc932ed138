//! Shared application context.
//!
//! Every component receives one [`AppContext`] built at startup instead of
//! reaching for module-level globals: the host client, the remote database
//! clients, the existence cache, the work queue, and the local state store.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::cache::ExistenceCache;
use crate::config::Config;
use crate::extract::ThemeResolver;
use crate::plex::PlexClient;
use crate::store::migrations::MigrationTracker;
use crate::store::StateStore;
use crate::themedb::ThemeDbClient;
use crate::tmdb::TmdbClient;
use crate::types::RatingKey;

pub struct AppContext {
    pub config: Config,
    pub plex: PlexClient,
    pub themedb: Arc<ThemeDbClient>,
    pub tmdb: TmdbClient,
    pub cache: ExistenceCache,
    pub store: StateStore,
    pub migrations: MigrationTracker,
    pub queue: UpdateQueue,
    pub resolver: Arc<dyn ThemeResolver>,
}

impl AppContext {
    /// Build the full context from configuration. All clients are
    /// constructed eagerly so a misconfigured server URL fails at startup
    /// rather than mid-pipeline.
    pub fn new(config: Config, resolver: Arc<dyn ThemeResolver>) -> Result<Arc<Self>> {
        let plex = PlexClient::new(&config.plex)?;
        let themedb = Arc::new(ThemeDbClient::new(&config.themedb.base_url)?);
        let tmdb = TmdbClient::new(&config.plex.url)?;
        let cache = ExistenceCache::new(themedb.clone());
        let store = StateStore::new(&config.themes.data_dir);
        let migrations = MigrationTracker::new(&config.themes.data_dir);

        Ok(Arc::new(Self {
            config,
            plex,
            themedb,
            tmdb,
            cache,
            store,
            migrations,
            queue: UpdateQueue::new(),
            resolver,
        }))
    }
}

/// Work queue carrying rating keys from the producers (event listener,
/// scheduled scans) to the upload workers.
///
/// The queue transports identifiers only; workers re-resolve full item state
/// at pull time. An in-flight set keeps the same key from being queued twice
/// while it is waiting or being processed — a duplicate that slips through
/// is harmless because the applied-state check absorbs it.
pub struct UpdateQueue {
    tx: mpsc::UnboundedSender<RatingKey>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<RatingKey>>,
    in_flight: parking_lot::Mutex<HashSet<RatingKey>>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            in_flight: parking_lot::Mutex::new(HashSet::new()),
        }
    }

    /// Queue a rating key for processing. Returns false when the key is
    /// already queued or in progress.
    pub fn enqueue(&self, rating_key: RatingKey) -> bool {
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(rating_key) {
                return false;
            }
        }

        if self.tx.send(rating_key).is_err() {
            // receiver gone; the process is shutting down
            self.in_flight.lock().remove(&rating_key);
            return false;
        }
        true
    }

    /// Pull the next rating key, waiting until one is available. Returns
    /// `None` only when the queue is closed.
    pub async fn next(&self) -> Option<RatingKey> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Non-blocking pull, for tests and drain loops.
    pub fn try_next(&self) -> Option<RatingKey> {
        let mut rx = self.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    /// Mark a pulled rating key as finished, allowing it to be queued again.
    pub fn finish(&self, rating_key: RatingKey) {
        self.in_flight.lock().remove(&rating_key);
    }
}

impl Default for UpdateQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let queue = UpdateQueue::new();
        let key = RatingKey::new(42);

        assert!(queue.enqueue(key));
        assert!(!queue.enqueue(key));

        assert_eq!(queue.try_next(), Some(key));
        // still in flight until finished
        assert!(!queue.enqueue(key));

        queue.finish(key);
        assert!(queue.enqueue(key));
    }

    #[tokio::test]
    async fn next_returns_queued_keys_in_order() {
        let queue = UpdateQueue::new();
        queue.enqueue(RatingKey::new(1));
        queue.enqueue(RatingKey::new(2));

        assert_eq!(queue.next().await, Some(RatingKey::new(1)));
        assert_eq!(queue.next().await, Some(RatingKey::new(2)));
    }
}
