pub mod pool;
pub mod reindex;

use plexrecs_providers::ProviderError;

pub use pool::{CandidatePool, ContentIndex, Sample};
pub use reindex::{PartitionReport, ReindexReport};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("media server error: {0}")]
    Provider(#[from] ProviderError),
}
