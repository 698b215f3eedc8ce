use plexrecs_core::types::ServerItem;

use crate::{HistoryLookup, ListMember, ProviderError, SectionQuery};

/// The media server that owns the library sections.
#[async_trait::async_trait]
pub trait MediaServer: Send + Sync {
    fn name(&self) -> &str;

    /// Enumerate every top-level item of a section.
    async fn list_section_items(&self, section_id: i64) -> Result<Vec<ServerItem>, ProviderError>;

    /// Search one section by title/year or by cross-reference guid.
    async fn search_section(
        &self,
        section_id: i64,
        query: &SectionQuery,
    ) -> Result<Vec<ServerItem>, ProviderError>;
}

/// Playback history for server users.
#[async_trait::async_trait]
pub trait HistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Titles the user has played in any of the given sections.
    async fn watched_titles(
        &self,
        username: &str,
        section_ids: &[i64],
    ) -> Result<HistoryLookup, ProviderError>;
}

/// External rating lookups.
#[async_trait::async_trait]
pub trait RatingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Rating for a title, `None` when the service has no usable rating.
    async fn rating(&self, title: &str, year: Option<i32>) -> Result<Option<f64>, ProviderError>;
}

/// Curated third-party lists.
#[async_trait::async_trait]
pub trait ListProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Members of a named list. Unknown lists are `ProviderError::NotFound`.
    async fn list_members(&self, list_name: &str) -> Result<Vec<ListMember>, ProviderError>;
}
