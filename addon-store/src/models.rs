use crate::files::{file_type_info, FileTypeInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identifier of a workshop item in the remote catalog.
///
/// Deserializes from either a JSON number or a decimal string, since the
/// backend and its events do not agree on one form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PublishedFileId(pub u64);

impl fmt::Display for PublishedFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PublishedFileId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(PublishedFileId)
    }
}

impl From<u64> for PublishedFileId {
    fn from(id: u64) -> Self {
        PublishedFileId(id)
    }
}

impl<'de> Deserialize<'de> for PublishedFileId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(id) => Ok(PublishedFileId(id)),
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// One page of a paginated listing, with the size of the whole listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total: u32,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Metadata embedded in an addon archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonMetadata {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub addon_type: Option<String>,
    pub tags: Vec<String>,
    pub ignore: Vec<String>,
    pub description: Option<String>,
}

/// Summary of an addon installed on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledAddon {
    pub path: PathBuf,
    #[serde(default)]
    pub id: Option<PublishedFileId>,
    #[serde(default)]
    pub size: u64,
    /// Unix seconds
    #[serde(default)]
    pub modified: Option<i64>,
    #[serde(default)]
    pub metadata: Option<AddonMetadata>,
}

impl InstalledAddon {
    pub fn title(&self) -> Option<&str> {
        self.metadata.as_ref()?.title.as_deref()
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.modified?, 0)
    }
}

/// A file packed inside an installed addon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonEntry {
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub crc: u32,
}

impl AddonEntry {
    pub fn type_info(&self) -> FileTypeInfo {
        file_type_info(&self.path)
    }
}

/// Full record of an installed addon, including its file listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonDetail {
    #[serde(flatten)]
    pub addon: InstalledAddon,
    #[serde(default)]
    pub entries: Vec<AddonEntry>,
}

/// A workshop item as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkshopItem {
    pub id: PublishedFileId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub owner: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub time_created: Option<i64>,
    /// Unix seconds
    #[serde(default)]
    pub time_updated: Option<i64>,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub subscriptions: u64,
    #[serde(default)]
    pub local_file: Option<PathBuf>,
    /// The catalog no longer knows this item.
    #[serde(default)]
    pub dead: bool,
}

impl WorkshopItem {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time_created?, 0)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time_updated?, 0)
    }
}
