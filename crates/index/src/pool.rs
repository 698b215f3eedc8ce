use std::collections::HashSet;
use std::sync::Arc;

use plexrecs_core::types::{ContentItem, CrossRefId, MediaKind, SampleScope};
use plexrecs_db::repo::content::{self, ContentRow};
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::debug;

use crate::IndexError;

/// Outcome of a reject-and-resample draw.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Found(ContentItem),
    /// Every draw hit an excluded title, either for the whole budget or
    /// until no undrawn item was left in scope.
    Exhausted { attempts: u32 },
    /// Nothing reachable in scope.
    EmptyScope,
}

/// Source of random candidates for the picker.
#[async_trait::async_trait]
pub trait CandidatePool: Send + Sync {
    /// One uniformly random reachable item whose external key is not in
    /// `skip_keys`, `None` when nothing of the scope is left.
    async fn sample_random_skipping(
        &self,
        scope: &SampleScope,
        skip_keys: &[String],
    ) -> Result<Option<ContentItem>, IndexError>;

    /// One uniformly random reachable item, `None` when the scope is empty.
    async fn sample_random(&self, scope: &SampleScope) -> Result<Option<ContentItem>, IndexError> {
        self.sample_random_skipping(scope, &[]).await
    }

    /// The reachable item indexed under a server rating key.
    async fn find_by_external_key(&self, key: &str) -> Result<Option<ContentItem>, IndexError>;

    /// Draw until a title outside `excluded` comes up, at most `budget` times.
    /// A rejected item is never drawn twice in one call.
    async fn sample_random_excluding(
        &self,
        scope: &SampleScope,
        excluded: &HashSet<String>,
        budget: u32,
    ) -> Result<Sample, IndexError> {
        let mut rejected = Vec::new();
        for attempt in 0..budget {
            let Some(item) = self.sample_random_skipping(scope, &rejected).await? else {
                if attempt == 0 {
                    return Ok(Sample::EmptyScope);
                }
                debug!(%scope, attempt, "every item in scope rejected");
                return Ok(Sample::Exhausted { attempts: attempt });
            };
            if !excluded.contains(&item.title) {
                return Ok(Sample::Found(item));
            }
            debug!(%scope, attempt, title = %item.title, "excluded title drawn, resampling");
            rejected.push(item.external_key);
        }
        Ok(Sample::Exhausted { attempts: budget })
    }
}

/// The local content index backed by SQLite.
///
/// Clones share one sweep lock, so at most one reindex runs at a time.
#[derive(Clone)]
pub struct ContentIndex {
    pool: SqlitePool,
    sweep_lock: Arc<Mutex<()>>,
}

impl ContentIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            sweep_lock: Arc::new(Mutex::new(())),
        }
    }

    pub(crate) fn sweep_lock(&self) -> &Mutex<()> {
        &self.sweep_lock
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Reachable items in scope.
    pub async fn count(&self, scope: &SampleScope) -> Result<i64, IndexError> {
        let n = match scope {
            SampleScope::Partition(name) => {
                content::count_reachable_in_partition(&self.pool, name).await?
            }
            SampleScope::Kind(kind) => {
                content::count_reachable_of_kind(&self.pool, kind.as_str()).await?
            }
        };
        Ok(n)
    }

    /// Every item of a partition, reachable or not.
    pub async fn list_partition(&self, partition: &str) -> Result<Vec<ContentItem>, IndexError> {
        let rows = content::list_partition(&self.pool, partition).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.hydrate(row).await?);
        }
        Ok(items)
    }

    async fn hydrate(&self, row: ContentRow) -> Result<ContentItem, IndexError> {
        let cross_ref_ids = content::get_cross_refs(&self.pool, &row.id)
            .await?
            .iter()
            .filter_map(|s| CrossRefId::parse(s))
            .collect();
        Ok(row_to_item(row, cross_ref_ids))
    }
}

#[async_trait::async_trait]
impl CandidatePool for ContentIndex {
    async fn sample_random_skipping(
        &self,
        scope: &SampleScope,
        skip_keys: &[String],
    ) -> Result<Option<ContentItem>, IndexError> {
        let row = match scope {
            SampleScope::Partition(name) => {
                content::random_in_partition(&self.pool, name, skip_keys).await?
            }
            SampleScope::Kind(kind) => {
                content::random_of_kind(&self.pool, kind.as_str(), skip_keys).await?
            }
        };
        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_external_key(&self, key: &str) -> Result<Option<ContentItem>, IndexError> {
        match content::get_by_external_key(&self.pool, key).await? {
            Some(row) if row.is_reachable => Ok(Some(self.hydrate(row).await?)),
            _ => Ok(None),
        }
    }
}

fn row_to_item(row: ContentRow, cross_ref_ids: Vec<CrossRefId>) -> ContentItem {
    let kind = MediaKind::from_type_lossy(&row.kind);
    ContentItem {
        id: row.id,
        title: row.title,
        year: row.year.and_then(|y| i32::try_from(y).ok()),
        external_key: row.external_key,
        partition: row.partition_name,
        section_id: row.section_id,
        kind,
        cross_ref_ids,
        is_reachable: row.is_reachable,
        last_seen_ts: row.last_seen_ts,
    }
}
