use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use plexrecs_core::error::{ApiError, ParameterProblem, PickError};
use plexrecs_core::types::{ContentItem, RatingBound, SampleScope};
use plexrecs_db::repo::jobs::JobRow;
use plexrecs_picker::{Candidate, PickRequest};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_JOB_LIMIT: i64 = 50;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/partitions", get(list_partitions))
        .route("/recommendations", post(recommend))
        .route("/reindex", post(reindex))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| ApiError::Internal(format!("database check failed: {e}")))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Partitions
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PartitionResponse {
    name: String,
    section_ids: Vec<i64>,
    reachable_items: i64,
}

async fn list_partitions(
    State(state): State<AppState>,
) -> Result<Json<Vec<PartitionResponse>>, AppError> {
    let mut out = Vec::new();
    for partition in state.partitions.iter() {
        let reachable_items = state
            .index
            .count(&SampleScope::Partition(partition.name.clone()))
            .await
            .map_err(|e| ApiError::Internal(format!("index error: {e}")))?;
        out.push(PartitionResponse {
            name: partition.name.clone(),
            section_ids: partition.section_ids.clone(),
            reachable_items,
        });
    }
    Ok(Json(out))
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum Mode {
    Plain,
    Unwatched,
    Rated,
    List,
}

#[derive(Debug, Deserialize)]
struct RecommendationRequest {
    mode: Mode,
    category: Option<String>,
    username: Option<String>,
    rating: Option<f64>,
    bound: Option<RatingBound>,
    list: Option<String>,
}

#[derive(Serialize)]
struct RecommendationResponse {
    message: String,
    item: ContentItem,
    /// Whether the item was confirmed on the server just now.
    available: bool,
    link: Option<String>,
}

impl RecommendationRequest {
    fn into_pick(self, state: &AppState) -> Result<PickRequest, AppError> {
        let missing_category = || {
            PickError::Parameter(ParameterProblem::MissingCategory {
                accepted: state
                    .partitions
                    .names()
                    .iter()
                    .map(|n| n.to_string())
                    .collect(),
            })
        };
        let category = self.category.filter(|c| !c.trim().is_empty());

        let request = match self.mode {
            Mode::Plain => PickRequest::Plain {
                category: category.ok_or_else(missing_category)?,
            },
            Mode::Unwatched => PickRequest::Unwatched {
                category: category.ok_or_else(missing_category)?,
                username: self.username.unwrap_or_default(),
            },
            Mode::Rated => PickRequest::Rated {
                category: category.ok_or_else(missing_category)?,
                threshold: self
                    .rating
                    .ok_or_else(|| ApiError::BadRequest("Please include a rating.".into()))?,
                bound: self.bound.unwrap_or(RatingBound::AtLeast),
            },
            Mode::List => PickRequest::FromList {
                list_name: self
                    .list
                    .filter(|l| !l.trim().is_empty())
                    .ok_or_else(|| ApiError::BadRequest("Please include a list name.".into()))?,
                category,
            },
        };
        Ok(request)
    }
}

async fn recommend(
    State(state): State<AppState>,
    Json(body): Json<RecommendationRequest>,
) -> Result<Json<RecommendationResponse>, AppError> {
    let request = body.into_pick(&state)?;
    let item = state.picker.pick(&request).await?;

    let (available, link) = match state
        .picker
        .resolver()
        .resolve(&Candidate::from(&item), true)
        .await
    {
        Ok(Some(found)) => (
            true,
            state
                .link
                .as_ref()
                .map(|l| l.for_rating_key(&found.rating_key)),
        ),
        Ok(None) => (false, None),
        Err(e) => {
            warn!(title = %item.title, error = %e, "could not confirm pick on the server");
            (false, None)
        }
    };

    Ok(Json(RecommendationResponse {
        message: format!("How about {}?", item.title),
        item,
        available,
        link,
    }))
}

// ---------------------------------------------------------------------------
// Reindex jobs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct JobResponse {
    id: String,
    kind: String,
    status: String,
    progress: f64,
    payload: Option<serde_json::Value>,
    error: Option<String>,
    created_ts: i64,
    updated_ts: i64,
}

fn job_to_response(job: JobRow) -> JobResponse {
    let payload = job
        .payload_json
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok());
    JobResponse {
        id: job.id,
        kind: job.kind,
        status: job.status,
        progress: job.progress,
        payload,
        error: job.error,
        created_ts: job.created_ts,
        updated_ts: job.updated_ts,
    }
}

async fn reindex(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<JobResponse>), AppError> {
    let job = crate::reindex_job::enqueue_reindex(&state).await?;
    Ok((StatusCode::ACCEPTED, Json(job_to_response(job))))
}

#[derive(Deserialize)]
struct JobsQuery {
    limit: Option<i64>,
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<Vec<JobResponse>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_JOB_LIMIT).clamp(1, 500);
    let jobs = plexrecs_db::repo::jobs::list_jobs(&state.db, limit).await?;
    Ok(Json(jobs.into_iter().map(job_to_response).collect()))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, AppError> {
    let job = plexrecs_db::repo::jobs::get_job(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("job not found".into()))?;

    Ok(Json(job_to_response(job)))
}
