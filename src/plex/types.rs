//! Wire types for the host server's JSON API.
//!
//! The server wraps every response in a `MediaContainer` envelope and reports
//! most identifiers as strings, so the raw structs here are converted into
//! the friendlier [`Section`] / [`Item`] types before leaving this module.

use serde::Deserialize;

use crate::types::{ItemType, RatingKey};

/// A library section (a "Movies" or "TV Shows" library).
#[derive(Debug, Clone)]
pub struct Section {
    pub id: u32,
    pub title: String,
    pub agent: String,
    pub section_type: String,
    pub language: String,
}

/// A library item as read from the host server.
#[derive(Debug, Clone)]
pub struct Item {
    pub rating_key: RatingKey,
    pub guid: String,
    pub item_type: ItemType,
    pub title: String,
    pub year: Option<u16>,
    pub library_section_id: Option<u32>,
    pub summary: Option<String>,
    /// Locator of the currently selected theme, if any.
    pub theme: Option<String>,
    /// Raw cross-reference guids, e.g. `tmdb://710`.
    pub guids: Vec<String>,
    /// Names of fields carrying the host's user-lock flag.
    pub locked_fields: Vec<String>,
}

impl Item {
    /// Whether the given field carries the host's user-lock flag.
    pub fn is_locked(&self, field: &str) -> bool {
        self.locked_fields.iter().any(|f| f == field)
    }
}

/// One entry from an item's theme listing.
#[derive(Debug, Clone)]
pub struct ThemeEntry {
    pub rating_key: String,
    pub provider: Option<String>,
    pub selected: bool,
}

// ---------------------------------------------------------------------------
// Raw response envelopes (private to the plex module)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    pub media_container: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DirectoryContainer {
    #[serde(rename = "Directory", default)]
    pub directories: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetadataContainer {
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<RawMetadata>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSection {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub agent: String,
    #[serde(rename = "type")]
    pub section_type: String,
    #[serde(default)]
    pub language: String,
}

impl RawSection {
    pub(crate) fn into_section(self) -> Option<Section> {
        let id = self.key.parse().ok()?;
        Some(Section {
            id,
            title: self.title,
            agent: self.agent,
            section_type: self.section_type,
            language: self.language,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMetadata {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    #[serde(default)]
    pub guid: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(rename = "librarySectionID", default)]
    pub library_section_id: Option<u32>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(rename = "Guid", default)]
    pub guids: Vec<RawGuid>,
    #[serde(rename = "Field", default)]
    pub fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawGuid {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawField {
    pub name: String,
    #[serde(default)]
    pub locked: bool,
}

impl RawMetadata {
    pub(crate) fn into_item(self) -> Option<Item> {
        let rating_key = self.rating_key.parse().ok()?;
        let item_type = ItemType::from_host_str(&self.item_type)?;
        Some(Item {
            rating_key,
            guid: self.guid,
            item_type,
            title: self.title,
            year: self.year,
            library_section_id: self.library_section_id,
            summary: self.summary,
            theme: self.theme,
            guids: self.guids.into_iter().map(|g| g.id).collect(),
            locked_fields: self
                .fields
                .into_iter()
                .filter(|f| f.locked)
                .map(|f| f.name)
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThemeListingContainer {
    #[serde(rename = "Metadata", default)]
    pub metadata: Vec<RawThemeEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawThemeEntry {
    #[serde(rename = "ratingKey")]
    pub rating_key: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub selected: bool,
}

impl RawThemeEntry {
    pub(crate) fn into_entry(self) -> ThemeEntry {
        ThemeEntry {
            rating_key: self.rating_key,
            provider: self.provider,
            selected: self.selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_parses_locks_and_guids() {
        let raw: Envelope<MetadataContainer> = serde_json::from_str(
            r#"{
                "MediaContainer": {
                    "Metadata": [{
                        "ratingKey": "49915",
                        "guid": "plex://movie/5d7768ba96b655001fdc0408",
                        "type": "movie",
                        "title": "GoldenEye",
                        "year": 1995,
                        "librarySectionID": 1,
                        "Guid": [
                            {"id": "imdb://tt0113189"},
                            {"id": "tmdb://710"}
                        ],
                        "Field": [
                            {"name": "theme", "locked": true},
                            {"name": "title", "locked": false}
                        ]
                    }]
                }
            }"#,
        )
        .unwrap();

        let item = raw
            .media_container
            .metadata
            .into_iter()
            .next()
            .unwrap()
            .into_item()
            .unwrap();

        assert_eq!(item.rating_key, RatingKey::new(49915));
        assert_eq!(item.item_type, ItemType::Movie);
        assert_eq!(item.guids, vec!["imdb://tt0113189", "tmdb://710"]);
        assert!(item.is_locked("theme"));
        assert!(!item.is_locked("title"));
    }

    #[test]
    fn unknown_item_type_is_dropped() {
        let raw = RawMetadata {
            rating_key: "1".to_string(),
            guid: String::new(),
            item_type: "episode".to_string(),
            title: String::new(),
            year: None,
            library_section_id: None,
            summary: None,
            theme: None,
            guids: vec![],
            fields: vec![],
        };
        assert!(raw.into_item().is_none());
    }
}
