pub mod plex;
pub mod provider;
pub mod tautulli;
pub mod tmdb;
pub mod trakt;

use std::collections::HashSet;

use plexrecs_core::types::CrossRefId;
use thiserror::Error;

pub use provider::{HistoryProvider, ListProvider, MediaServer, RatingProvider};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("not found")]
    NotFound,
}

/// How to look for an item inside one library section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionQuery {
    TitleYear { title: String, year: Option<i32> },
    Guid(CrossRefId),
}

/// Result of a watch-history lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryLookup {
    Watched(HashSet<String>),
    UserNotFound,
}

/// One entry of a curated list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ListMember {
    pub title: String,
    pub year: Option<i32>,
    pub cross_ref_ids: Vec<CrossRefId>,
}

/// Parse a year from the leading `YYYY` of a date string.
pub(crate) fn year_from_date(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}
