//! Core identifier and classification types shared across overture.
//!
//! Newtype wrappers keep the host server's numeric rating keys from being
//! confused with other integers, and the enums here replace the string-keyed
//! lookup tables the host APIs traffic in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The host server's stable integer identifier for a library item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingKey(u32);

impl RatingKey {
    pub fn new(key: u32) -> Self {
        Self(key)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for RatingKey {
    fn from(key: u32) -> Self {
        Self(key)
    }
}

impl fmt::Display for RatingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RatingKey {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>().map(Self)
    }
}

/// Library item classification, as reported by the host server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Movie,
    Show,
    Collection,
}

impl ItemType {
    /// Parse the host's string form (`"movie"`, `"show"`, `"collection"`).
    pub fn from_host_str(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "show" => Some(Self::Show),
            "collection" => Some(Self::Collection),
            _ => None,
        }
    }

    /// Map the host's numeric search-type code (used in timeline events).
    pub fn from_type_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Movie),
            2 => Some(Self::Show),
            18 => Some(Self::Collection),
            _ => None,
        }
    }

    /// Directory name used by the host's metadata bundle tree, reused for the
    /// local applied-state layout.
    pub fn metadata_dir(&self) -> &'static str {
        match self {
            Self::Movie => "Movies",
            Self::Show => "TV Shows",
            Self::Collection => "Collections",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Movie => "movie",
            Self::Show => "show",
            Self::Collection => "collection",
        };
        write!(f, "{s}")
    }
}

/// Top-level partition of the theme database catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Movies,
    TvShows,
    MovieCollections,
}

impl DbType {
    pub const ALL: [DbType; 3] = [Self::Movies, Self::TvShows, Self::MovieCollections];

    /// Path segment used by the theme database API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movies => "movies",
            Self::TvShows => "tv_shows",
            Self::MovieCollections => "movie_collections",
        }
    }

}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Upstream metadata databases the theme database can key entries by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Database {
    TheMovieDb,
    Imdb,
    TheTvDb,
}

impl Database {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TheMovieDb => "themoviedb",
            Self::Imdb => "imdb",
            Self::TheTvDb => "thetvdb",
        }
    }

    /// Map a guid scheme (`tmdb://...`, `imdb://...`, `tvdb://...`) to the
    /// database it references.
    pub fn from_guid_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "tmdb" => Some(Self::TheMovieDb),
            "imdb" => Some(Self::Imdb),
            "tvdb" => Some(Self::TheTvDb),
            _ => None,
        }
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata agents overture contributes themes to.
pub const SUPPORTED_AGENTS: [&str; 2] = ["tv.plex.agents.movie", "tv.plex.agents.series"];

/// Agent identifier for the host's current movie agent.
pub const MOVIE_AGENT: &str = "tv.plex.agents.movie";

/// Agent identifier for the host's current series agent.
pub const SERIES_AGENT: &str = "tv.plex.agents.series";
