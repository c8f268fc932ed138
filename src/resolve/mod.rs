//! Resolution of a library item to its theme-database identity.
//!
//! The theme database keys entries by `(database_type, database, id)`.
//! Movies carry usable guids directly; shows may only have imdb/tvdb guids,
//! which are translated to canonical IDs through the movie database;
//! collections have no guids at all and are matched by title search. The
//! identity is recomputed on every pass and never stored.

use anyhow::Result;
use tracing::{debug, error};

use crate::context::AppContext;
use crate::plex::Item;
use crate::tmdb::{ExternalDb, FindKind};
use crate::types::{Database, DbType, ItemType, MOVIE_AGENT, SERIES_AGENT};

/// The theme-database identity of a library item. Fields are filled
/// best-effort; the pipeline only proceeds when all of them are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    pub db_type: Option<DbType>,
    pub database: Option<Database>,
    pub agent: Option<String>,
    pub external_id: Option<String>,
}

impl Identity {
    /// Borrow the identity as a complete tuple, or `None` if any part is
    /// missing.
    pub fn complete(&self) -> Option<(DbType, Database, &str, &str)> {
        Some((
            self.db_type?,
            self.database?,
            self.agent.as_deref()?,
            self.external_id.as_deref()?,
        ))
    }
}

/// Resolve the theme-database identity for an item.
pub async fn resolve(ctx: &AppContext, item: &Item) -> Identity {
    debug!("Resolving database identity for \"{}\"", item.title);

    let identity = match item.item_type {
        ItemType::Movie => resolve_movie(item),
        ItemType::Show => resolve_show(ctx, item).await,
        ItemType::Collection => resolve_collection(ctx, item).await,
    };

    debug!(
        "Database identity for \"{}\": {:?}",
        item.title, identity
    );
    identity
}

/// Split a raw guid like `tmdb://710` into its database and id.
fn parse_guid(guid: &str) -> Option<(Database, &str)> {
    let (scheme, id) = guid.split_once("://")?;
    Database::from_guid_scheme(scheme).map(|database| (database, id))
}

fn resolve_movie(item: &Item) -> Identity {
    let mut identity = Identity::default();

    // guids is empty for items from legacy agents
    if item.guids.is_empty() {
        return identity;
    }

    identity.agent = Some(MOVIE_AGENT.to_string());
    identity.db_type = Some(DbType::Movies);

    for guid in &item.guids {
        let Some((database, id)) = parse_guid(guid) else {
            continue;
        };

        match database {
            Database::Imdb => {
                identity.database = Some(Database::Imdb);
                identity.external_id = Some(id.to_string());
            }
            // tmdb is the preferred database, stop looking once found
            Database::TheMovieDb => {
                identity.database = Some(Database::TheMovieDb);
                identity.external_id = Some(id.to_string());
                break;
            }
            Database::TheTvDb => {}
        }
    }

    identity
}

async fn resolve_show(ctx: &AppContext, item: &Item) -> Identity {
    let mut identity = Identity {
        db_type: Some(DbType::TvShows),
        ..Identity::default()
    };

    if item.guids.is_empty() {
        return identity;
    }

    identity.agent = Some(SERIES_AGENT.to_string());

    for guid in &item.guids {
        let Some((database, id)) = parse_guid(guid) else {
            continue;
        };

        match database {
            // the theme database only tracks shows by canonical id, so
            // external ids have to be translated first
            Database::Imdb | Database::TheTvDb => {
                let external_db = if database == Database::Imdb {
                    ExternalDb::Imdb
                } else {
                    ExternalDb::Tvdb
                };

                match lookup_canonical_id(ctx, id, external_db).await {
                    Ok(Some(canonical)) => {
                        identity.database = Some(Database::TheMovieDb);
                        identity.external_id = Some(canonical.to_string());
                        break;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!("Error translating external ID {id}: {e:#}");
                    }
                }
            }
            Database::TheMovieDb => {
                identity.database = Some(Database::TheMovieDb);
                identity.external_id = Some(id.to_string());
                break;
            }
        }
    }

    identity
}

async fn lookup_canonical_id(
    ctx: &AppContext,
    id: &str,
    database: ExternalDb,
) -> Result<Option<u64>> {
    ctx.tmdb
        .find_by_external_id(id, database, FindKind::Tv)
        .await
}

async fn resolve_collection(ctx: &AppContext, item: &Item) -> Identity {
    // collections don't cross-reference any database, so the title is
    // matched against the collection search endpoint, scoped to the owning
    // section's language
    let Some(section_id) = item.library_section_id else {
        debug!("Collection \"{}\" has no library section", item.title);
        return Identity::default();
    };

    let section = match ctx.plex.section(section_id).await {
        Ok(section) => section,
        Err(e) => {
            error!(
                "Unable to reach the server to resolve collection \"{}\": {e:#}",
                item.title
            );
            return Identity::default();
        }
    };

    let external_id = match ctx
        .tmdb
        .search_collection(&item.title, &section.language)
        .await
    {
        Ok(id) => id.map(|id| id.to_string()),
        Err(e) => {
            debug!("Error searching for collection \"{}\": {e:#}", item.title);
            None
        }
    };

    Identity {
        db_type: Some(DbType::MovieCollections),
        database: Some(Database::TheMovieDb),
        agent: Some(section.agent),
        external_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RatingKey;

    fn movie(guids: Vec<&str>) -> Item {
        Item {
            rating_key: RatingKey::new(1),
            guid: "plex://movie/abc".to_string(),
            item_type: ItemType::Movie,
            title: "GoldenEye".to_string(),
            year: Some(1995),
            library_section_id: Some(1),
            summary: None,
            theme: None,
            guids: guids.into_iter().map(String::from).collect(),
            locked_fields: vec![],
        }
    }

    #[test]
    fn movie_prefers_tmdb_over_imdb() {
        let identity = resolve_movie(&movie(vec!["imdb://tt0113189", "tmdb://710"]));

        assert_eq!(identity.db_type, Some(DbType::Movies));
        assert_eq!(identity.database, Some(Database::TheMovieDb));
        assert_eq!(identity.agent.as_deref(), Some("tv.plex.agents.movie"));
        assert_eq!(identity.external_id.as_deref(), Some("710"));

        let (db_type, database, agent, id) = identity.complete().unwrap();
        assert_eq!(db_type, DbType::Movies);
        assert_eq!(database, Database::TheMovieDb);
        assert_eq!(agent, "tv.plex.agents.movie");
        assert_eq!(id, "710");
    }

    #[test]
    fn movie_falls_back_to_imdb() {
        let identity = resolve_movie(&movie(vec!["imdb://tt0113189"]));

        assert_eq!(identity.database, Some(Database::Imdb));
        assert_eq!(identity.external_id.as_deref(), Some("tt0113189"));
    }

    #[test]
    fn legacy_movie_without_guids_is_incomplete() {
        let identity = resolve_movie(&movie(vec![]));

        assert_eq!(identity, Identity::default());
        assert!(identity.complete().is_none());
    }

    #[test]
    fn unknown_guid_schemes_are_skipped() {
        let identity = resolve_movie(&movie(vec!["mbid://1234", "tmdb://710"]));

        assert_eq!(identity.external_id.as_deref(), Some("710"));
    }
}
