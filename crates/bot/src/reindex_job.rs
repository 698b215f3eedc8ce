use std::time::Duration;

use plexrecs_core::error::ApiError;
use plexrecs_db::repo::jobs::{self, JobRow, KIND_REINDEX};
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::state::AppState;

/// Record a reindex job and run it in the background.
pub async fn enqueue_reindex(state: &AppState) -> Result<JobRow, AppError> {
    let payload = serde_json::json!({ "partitions": state.partitions.names() });
    let job = jobs::create_job(&state.db, KIND_REINDEX, Some(&payload.to_string()))
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let state = state.clone();
    let job_id = job.id.clone();
    tokio::spawn(async move {
        run_reindex_job(&state, &job_id).await;
    });

    Ok(job)
}

/// Sweep every partition under an existing job row, recording the outcome.
pub async fn run_reindex_job(state: &AppState, job_id: &str) {
    if let Err(e) = update_job_status_with_retry(&state.db, job_id, "running", 0.0, None).await {
        error!(job_id, error = %e, "failed to set job status to running");
    }

    match state
        .index
        .reindex_all(state.server.as_ref(), &state.partitions, state.purge_after_secs)
        .await
    {
        Ok(report) => {
            let failed = report.failures().count();
            info!(
                job_id,
                partitions = report.partitions.len(),
                failed,
                purged = report.purged,
                "reindex completed"
            );
            match serde_json::to_string(&report) {
                Ok(summary) => {
                    if let Err(e) = jobs::set_job_payload(&state.db, job_id, &summary).await {
                        warn!(job_id, error = %e, "failed to store reindex summary");
                    }
                }
                Err(e) => warn!(job_id, error = %e, "failed to serialize reindex summary"),
            }
            if let Err(e) =
                update_job_status_with_retry(&state.db, job_id, "completed", 1.0, None).await
            {
                error!(job_id, error = %e, "failed to set job status to completed");
            }
        }
        Err(e) => {
            error!(job_id, error = %e, "reindex failed");
            if let Err(update_err) = update_job_status_with_retry(
                &state.db,
                job_id,
                "failed",
                0.0,
                Some(&e.to_string()),
            )
            .await
            {
                error!(job_id, error = %update_err, "failed to set job status to failed");
            }
        }
    }
}

/// Reindex once now, then every `interval`.
pub fn spawn_periodic_reindex(state: AppState, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match jobs::create_job(&state.db, KIND_REINDEX, None).await {
                Ok(job) => run_reindex_job(&state, &job.id).await,
                Err(e) => error!(error = %e, "failed to record scheduled reindex"),
            }
        }
    })
}

async fn update_job_status_with_retry(
    pool: &sqlx::SqlitePool,
    job_id: &str,
    status: &str,
    progress: f64,
    error: Option<&str>,
) -> Result<(), sqlx::Error> {
    let mut last_err = None;
    for _ in 0..5 {
        match jobs::update_job_status(pool, job_id, status, progress, error).await {
            Ok(_) => return Ok(()),
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(Duration::from_millis(120)).await;
            }
        }
    }
    match last_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
