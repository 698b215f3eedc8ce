use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Media kind stored in the `content.kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Show,
    Artist,
    Album,
    Track,
    Other,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Show => "show",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Track => "track",
            Self::Other => "other",
        }
    }

    /// Map a Plex metadata `type` (or a stored column value) onto a kind.
    /// Anything unrecognised becomes `Other`.
    pub fn from_type_lossy(s: &str) -> Self {
        match s {
            "movie" => Self::Movie,
            "show" => Self::Show,
            "artist" => Self::Artist,
            "album" => Self::Album,
            "track" => Self::Track,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cross-service identifier in Plex guid form, e.g. `imdb://tt0111161`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CrossRefId {
    pub source: String,
    pub value: String,
}

impl CrossRefId {
    pub fn new(source: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            value: value.into(),
        }
    }

    /// Parse `source://value`. Returns `None` when either side is empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (source, value) = s.split_once("://")?;
        if source.is_empty() || value.is_empty() {
            return None;
        }
        Some(Self::new(source, value))
    }
}

impl std::fmt::Display for CrossRefId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.source, self.value)
    }
}

impl From<CrossRefId> for String {
    fn from(id: CrossRefId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for CrossRefId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("not a cross-reference id: {s}"))
    }
}

/// One locally indexed media item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    /// Plex rating key. May be stale until the next reindex.
    pub external_key: String,
    pub partition: String,
    pub section_id: i64,
    pub kind: MediaKind,
    pub cross_ref_ids: Vec<CrossRefId>,
    pub is_reachable: bool,
    pub last_seen_ts: i64,
}

/// An item as the media server itself reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerItem {
    pub rating_key: String,
    pub title: String,
    pub year: Option<i32>,
    pub kind: MediaKind,
    pub section_id: i64,
    pub guids: Vec<CrossRefId>,
}

/// Which way a rating threshold is applied. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingBound {
    AtLeast,
    AtMost,
}

impl RatingBound {
    pub fn admits(self, rating: f64, threshold: f64) -> bool {
        match self {
            Self::AtLeast => rating >= threshold,
            Self::AtMost => rating <= threshold,
        }
    }
}

/// Scope for a random draw from the content index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleScope {
    Partition(String),
    Kind(MediaKind),
}

impl std::fmt::Display for SampleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Partition(name) => write!(f, "partition:{name}"),
            Self::Kind(kind) => write!(f, "kind:{kind}"),
        }
    }
}

/// A named group of Plex library sections, e.g. `show` -> `[2, 7]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryPartition {
    pub name: String,
    pub section_ids: Vec<i64>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PartitionConfigError {
    #[error("partition name must not be empty")]
    EmptyName,
    #[error("partition {0} is defined twice")]
    DuplicateName(String),
    #[error("section {section_id} is assigned to both {first} and {second}")]
    SharedSection {
        section_id: i64,
        first: String,
        second: String,
    },
}

/// The configured partitions. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryPartitions {
    partitions: Vec<LibraryPartition>,
}

impl LibraryPartitions {
    /// Validate and build. Partitions without sections are dropped.
    pub fn new(partitions: Vec<LibraryPartition>) -> Result<Self, PartitionConfigError> {
        let mut names = HashSet::new();
        let mut owners: Vec<(i64, String)> = Vec::new();
        let mut kept = Vec::new();

        for partition in partitions {
            if partition.name.trim().is_empty() {
                return Err(PartitionConfigError::EmptyName);
            }
            if !names.insert(partition.name.clone()) {
                return Err(PartitionConfigError::DuplicateName(partition.name));
            }
            if partition.section_ids.is_empty() {
                continue;
            }
            let mut seen = HashSet::new();
            let section_ids: Vec<i64> = partition
                .section_ids
                .iter()
                .copied()
                .filter(|id| seen.insert(*id))
                .collect();
            for &section_id in &section_ids {
                if let Some((_, first)) = owners.iter().find(|(id, _)| *id == section_id) {
                    return Err(PartitionConfigError::SharedSection {
                        section_id,
                        first: first.clone(),
                        second: partition.name,
                    });
                }
                owners.push((section_id, partition.name.clone()));
            }
            kept.push(LibraryPartition {
                name: partition.name,
                section_ids,
            });
        }

        Ok(Self { partitions: kept })
    }

    pub fn get(&self, name: &str) -> Option<&LibraryPartition> {
        self.partitions.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LibraryPartition> {
        self.partitions.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.partitions.iter().map(|p| p.name.as_str()).collect()
    }

    /// Every configured section id, in configuration order.
    pub fn all_section_ids(&self) -> Vec<i64> {
        self.partitions
            .iter()
            .flat_map(|p| p.section_ids.iter().copied())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}
