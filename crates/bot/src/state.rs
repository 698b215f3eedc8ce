use std::sync::Arc;

use plexrecs_core::types::LibraryPartitions;
use plexrecs_index::ContentIndex;
use plexrecs_picker::Picker;
use plexrecs_providers::MediaServer;
use sqlx::SqlitePool;

/// Where playback links point.
#[derive(Debug, Clone)]
pub struct PlexLink {
    pub base_url: String,
    pub machine_id: String,
}

impl PlexLink {
    /// Web player link for an item's details page.
    pub fn for_rating_key(&self, rating_key: &str) -> String {
        format!(
            "{}/web/index.html#!/server/{}/details?key=%2Flibrary%2Fmetadata%2F{}",
            self.base_url.trim_end_matches('/'),
            self.machine_id,
            rating_key
        )
    }
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub index: ContentIndex,
    pub server: Arc<dyn MediaServer>,
    pub picker: Arc<Picker>,
    pub partitions: LibraryPartitions,
    /// `None` when the machine identifier is unknown; links are then omitted.
    pub link: Option<PlexLink>,
    /// Retention for unreachable items, in seconds.
    pub purge_after_secs: i64,
}
