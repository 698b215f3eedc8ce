//! Rebuild the content index from the media server.
//!
//! A sweep upserts every enumerated item under a fresh sweep id. Rows of a
//! partition that the sweep did not touch are flagged unreachable only once
//! all of the partition's sections enumerated cleanly; a later purge deletes
//! rows that stayed unreachable past the retention window.
//!
//! Sweeps are serialised: a sweep marking rows stamped by a concurrent sweep
//! would hide items that are still on the server.

use plexrecs_core::types::{LibraryPartition, LibraryPartitions, MediaKind};
use plexrecs_db::repo::content::{self, ContentUpsert};
use plexrecs_providers::MediaServer;
use serde::Serialize;
use tracing::{info, warn};

use crate::{ContentIndex, IndexError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    pub partition: String,
    pub seen: usize,
    pub marked_unreachable: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub partitions: Vec<PartitionReport>,
    pub purged: u64,
}

impl ReindexReport {
    pub fn failures(&self) -> impl Iterator<Item = &PartitionReport> {
        self.partitions.iter().filter(|p| p.error.is_some())
    }
}

impl ContentIndex {
    /// Sweep one partition. Any section failing aborts the partition before
    /// anything is marked unreachable.
    pub async fn reindex(
        &self,
        server: &dyn MediaServer,
        partition: &LibraryPartition,
    ) -> Result<PartitionReport, IndexError> {
        let _sweep = self.sweep_lock().lock().await;
        self.sweep_partition(server, partition).await
    }

    async fn sweep_partition(
        &self,
        server: &dyn MediaServer,
        partition: &LibraryPartition,
    ) -> Result<PartitionReport, IndexError> {
        let sweep_id = uuid::Uuid::new_v4().to_string();
        let mut seen = 0usize;

        for &section_id in &partition.section_ids {
            let items = server.list_section_items(section_id).await?;
            for item in &items {
                let cross_refs: Vec<String> = item.guids.iter().map(|g| g.to_string()).collect();
                let year = match item.kind {
                    MediaKind::Artist => None,
                    _ => item.year.map(i64::from),
                };
                content::upsert_content(
                    self.pool(),
                    &ContentUpsert {
                        external_key: &item.rating_key,
                        title: &item.title,
                        year,
                        partition_name: &partition.name,
                        section_id,
                        kind: item.kind.as_str(),
                        cross_refs: &cross_refs,
                    },
                    &sweep_id,
                )
                .await?;
            }
            seen += items.len();
        }

        let marked_unreachable =
            content::mark_unseen_unreachable(self.pool(), &partition.name, &sweep_id).await?;

        info!(
            partition = %partition.name,
            seen,
            marked_unreachable,
            "partition reindexed"
        );

        Ok(PartitionReport {
            partition: partition.name.clone(),
            seen,
            marked_unreachable,
            error: None,
        })
    }

    /// Sweep every partition independently, then purge rows that have been
    /// unreachable for longer than `retain_secs`.
    pub async fn reindex_all(
        &self,
        server: &dyn MediaServer,
        partitions: &LibraryPartitions,
        retain_secs: i64,
    ) -> Result<ReindexReport, IndexError> {
        let _sweep = self.sweep_lock().lock().await;
        let mut report = ReindexReport::default();

        for partition in partitions.iter() {
            match self.sweep_partition(server, partition).await {
                Ok(p) => report.partitions.push(p),
                Err(e) => {
                    warn!(partition = %partition.name, error = %e, "partition reindex failed");
                    report.partitions.push(PartitionReport {
                        partition: partition.name.clone(),
                        error: Some(e.to_string()),
                        ..Default::default()
                    });
                }
            }
        }

        let cutoff = chrono::Utc::now().timestamp() - retain_secs;
        report.purged = self.purge(cutoff).await?;

        Ok(report)
    }

    /// Delete unreachable rows last seen before `cutoff_ts`.
    pub async fn purge(&self, cutoff_ts: i64) -> Result<u64, IndexError> {
        let purged = content::purge_unreachable(self.pool(), cutoff_ts).await?;
        if purged > 0 {
            info!(purged, "purged unreachable content");
        }
        Ok(purged)
    }
}
