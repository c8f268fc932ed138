//! In-memory index of every ID known to the theme database.
//!
//! The pipeline consults this before fetching detail records so that items
//! with no possible theme never cost a remote round trip. The index is
//! rebuilt wholesale from the database's paginated catalog; a rebuild
//! younger than the validity window is a no-op, and concurrent callers wait
//! on the same rebuild instead of racing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::themedb::ThemeDbClient;
use crate::types::{Database, DbType};

/// How long a completed refresh stays authoritative.
const CACHE_VALIDITY: Duration = Duration::from_secs(3600);

/// Databases tracked per database type, with the catalog field holding each
/// database's ID.
fn tracked_databases(db_type: DbType) -> &'static [(Database, &'static str)] {
    match db_type {
        DbType::Movies => &[(Database::TheMovieDb, "id"), (Database::Imdb, "imdb_id")],
        DbType::TvShows => &[(Database::TheMovieDb, "id")],
        DbType::MovieCollections => &[(Database::TheMovieDb, "id")],
    }
}

type IdIndex = HashMap<Database, HashSet<String>>;

#[derive(Default)]
struct CacheInner {
    entries: HashMap<DbType, IdIndex>,
    last_refresh: Option<Instant>,
}

pub struct ExistenceCache {
    themedb: Arc<ThemeDbClient>,
    inner: Mutex<CacheInner>,
}

impl ExistenceCache {
    pub fn new(themedb: Arc<ThemeDbClient>) -> Self {
        Self {
            themedb,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Rebuild the index for every database type.
    ///
    /// A refresh already in progress makes callers wait rather than start a
    /// second import; a refresh inside the validity window is a no-op. A
    /// failed import for one type is logged and leaves that type's previous
    /// index untouched without affecting the others.
    pub async fn refresh(&self) {
        let mut inner = self.inner.lock().await;
        self.refresh_locked(&mut inner).await;
    }

    async fn refresh_locked(&self, inner: &mut CacheInner) {
        if let Some(last) = inner.last_refresh {
            if last.elapsed() < CACHE_VALIDITY {
                info!("Theme database cache updated less than an hour ago, skipping");
                return;
            }
        }

        info!("Updating theme database cache");

        for db_type in DbType::ALL {
            match self.import_type(db_type).await {
                Ok(index) => {
                    let total: usize = index.values().map(HashSet::len).sum();
                    info!("{db_type}: {total} items in database");
                    inner.entries.insert(db_type, index);
                }
                Err(e) => {
                    error!("{db_type}: Error retrieving page index from theme database: {e:#}");
                }
            }
        }

        inner.last_refresh = Some(Instant::now());
    }

    async fn import_type(&self, db_type: DbType) -> Result<IdIndex> {
        let page_count = self.themedb.page_count(db_type).await?;

        let mut index: IdIndex = tracked_databases(db_type)
            .iter()
            .map(|(database, _)| (*database, HashSet::new()))
            .collect();

        for page in 1..=page_count {
            let entries = self.themedb.catalog_page(db_type, page).await?;

            for (database, field) in tracked_databases(db_type) {
                let ids = index.get_mut(database).expect("database pre-seeded above");
                for entry in &entries {
                    if let Some(id) = entry.get(*field).and_then(value_to_id) {
                        ids.insert(id);
                    }
                }
            }
        }

        Ok(index)
    }

    /// Whether the given entry is known to the theme database.
    ///
    /// A cold cache (no entry for `db_type` yet) triggers a synchronous
    /// refresh before answering. After that, any miss means "not found".
    pub async fn exists(&self, db_type: DbType, database: Database, id: &str) -> bool {
        let mut inner = self.inner.lock().await;

        if !inner.entries.contains_key(&db_type) {
            debug!("{db_type}: no cached index, refreshing before lookup");
            self.refresh_locked(&mut inner).await;
        }

        inner
            .entries
            .get(&db_type)
            .and_then(|index| index.get(&database))
            .is_some_and(|ids| ids.contains(id))
    }
}

/// Catalog IDs appear both as JSON numbers (tmdb) and strings (imdb).
fn value_to_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_normalize_to_strings() {
        assert_eq!(
            value_to_id(&serde_json::json!(710)),
            Some("710".to_string())
        );
        assert_eq!(
            value_to_id(&serde_json::json!("tt0113189")),
            Some("tt0113189".to_string())
        );
        assert_eq!(value_to_id(&serde_json::json!(null)), None);
    }

    #[test]
    fn movies_track_both_databases() {
        let tracked = tracked_databases(DbType::Movies);
        assert_eq!(tracked.len(), 2);
        assert_eq!(tracked_databases(DbType::TvShows).len(), 1);
        assert_eq!(tracked_databases(DbType::MovieCollections).len(), 1);
    }
}
