use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum_test::TestServer;
use plexrecs_bot::routes::build_router;
use plexrecs_bot::state::{AppState, PlexLink};
use plexrecs_core::types::{LibraryPartition, LibraryPartitions, MediaKind, ServerItem};
use plexrecs_index::ContentIndex;
use plexrecs_picker::{Picker, Resolver};
use plexrecs_providers::{
    HistoryLookup, HistoryProvider, MediaServer, ProviderError, SectionQuery,
};
use serde_json::{Value, json};

#[derive(Default)]
struct FakeServer {
    items: Mutex<Vec<ServerItem>>,
}

impl FakeServer {
    fn remove(&self, rating_key: &str) {
        self.items.lock().unwrap().retain(|i| i.rating_key != rating_key);
    }
}

#[async_trait::async_trait]
impl MediaServer for FakeServer {
    fn name(&self) -> &str {
        "fake-plex"
    }

    async fn list_section_items(&self, section_id: i64) -> Result<Vec<ServerItem>, ProviderError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.section_id == section_id)
            .cloned()
            .collect())
    }

    async fn search_section(
        &self,
        section_id: i64,
        query: &SectionQuery,
    ) -> Result<Vec<ServerItem>, ProviderError> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.section_id == section_id)
            .filter(|i| match query {
                SectionQuery::TitleYear { title, year } => &i.title == title && i.year == *year,
                SectionQuery::Guid(id) => i.guids.contains(id),
            })
            .cloned()
            .collect())
    }
}

struct FakeHistory {
    watched: HashMap<String, HashSet<String>>,
}

#[async_trait::async_trait]
impl HistoryProvider for FakeHistory {
    fn name(&self) -> &str {
        "fake-tautulli"
    }

    async fn watched_titles(
        &self,
        username: &str,
        _section_ids: &[i64],
    ) -> Result<HistoryLookup, ProviderError> {
        Ok(match self.watched.get(username) {
            Some(titles) => HistoryLookup::Watched(titles.clone()),
            None => HistoryLookup::UserNotFound,
        })
    }
}

fn movie(key: &str, title: &str) -> ServerItem {
    ServerItem {
        rating_key: key.to_string(),
        title: title.to_string(),
        year: Some(1999),
        kind: MediaKind::Movie,
        section_id: 1,
        guids: Vec::new(),
    }
}

struct TestApp {
    server: TestServer,
    plex: Arc<FakeServer>,
    state: AppState,
}

/// A test app over an in-memory database, already reindexed once.
async fn test_app() -> TestApp {
    let pool = plexrecs_db::connect(":memory:").await.unwrap();
    plexrecs_db::migrate::run(&pool).await.unwrap();

    let plex = Arc::new(FakeServer::default());
    {
        let mut items = plex.items.lock().unwrap();
        items.push(movie("1", "A"));
        items.push(movie("2", "B"));
        items.push(movie("3", "C"));
    }

    let partitions = LibraryPartitions::new(vec![
        LibraryPartition {
            name: "movie".into(),
            section_ids: vec![1],
        },
        LibraryPartition {
            name: "music".into(),
            section_ids: vec![3],
        },
    ])
    .unwrap();

    let mut watched = HashMap::new();
    watched.insert(
        "alice".to_string(),
        ["A", "B"].iter().map(|s| s.to_string()).collect(),
    );
    let history = Arc::new(FakeHistory { watched });

    let index = ContentIndex::new(pool.clone());
    index
        .reindex_all(plex.as_ref(), &partitions, 3600)
        .await
        .unwrap();

    let resolver = Resolver::new(plex.clone(), partitions.all_section_ids());
    let picker = Picker::new(
        Arc::new(index.clone()),
        partitions.clone(),
        history,
        resolver,
    );

    let state = AppState {
        db: pool,
        index,
        server: plex.clone(),
        picker: Arc::new(picker),
        partitions,
        link: Some(PlexLink {
            base_url: "http://plex.local:32400".into(),
            machine_id: "machine-1".into(),
        }),
        purge_after_secs: 3600,
    };

    let server = TestServer::new(build_router(state.clone())).unwrap();
    TestApp {
        server,
        plex,
        state,
    }
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let app = test_app().await;
    let resp = app.server.get("/health").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn partitions_report_reachable_counts() {
    let app = test_app().await;
    let resp = app.server.get("/api/v1/partitions").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(
        body,
        json!([
            { "name": "movie", "section_ids": [1], "reachable_items": 3 },
            { "name": "music", "section_ids": [3], "reachable_items": 0 }
        ])
    );
}

#[tokio::test]
async fn plain_recommendation_includes_link() {
    let app = test_app().await;
    let resp = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "mode": "plain", "category": "movie" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();

    let title = body["item"]["title"].as_str().unwrap().to_string();
    let key = body["item"]["external_key"].as_str().unwrap().to_string();
    assert_eq!(body["message"], format!("How about {title}?"));
    assert_eq!(body["item"]["partition"], "movie");
    assert_eq!(body["available"], true);
    assert_eq!(
        body["link"],
        format!(
            "http://plex.local:32400/web/index.html#!/server/machine-1/details?key=%2Flibrary%2Fmetadata%2F{key}"
        )
    );
}

#[tokio::test]
async fn unwatched_recommendation_skips_watched_titles() {
    let app = test_app().await;
    for _ in 0..20 {
        let resp = app
            .server
            .post("/api/v1/recommendations")
            .json(&json!({ "mode": "unwatched", "category": "movie", "username": "alice" }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["item"]["title"], "C");
        assert_eq!(body["message"], "How about C?");
    }
}

#[tokio::test]
async fn pick_failures_use_stable_messages() {
    let app = test_app().await;

    let resp = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "mode": "unwatched", "category": "movie", "username": "mallory" }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "unknown_user");
    assert_eq!(body["error"]["message"], "I couldn't find that Plex username.");

    let resp = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "mode": "plain", "category": "music" }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "empty_scope");
    assert_eq!(
        body["error"]["message"],
        "There's nothing in that library yet. Please try again later."
    );

    let resp = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "mode": "plain", "category": "podcast" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(
        body["error"]["message"],
        "Please try again, indicating 'movie', 'music'."
    );

    let resp = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "mode": "rated", "category": "movie", "rating": 7.5 }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["message"], "Rating lookups are not configured.");
}

#[tokio::test]
async fn all_watched_runs_out_of_attempts() {
    let app = test_app().await;
    app.plex.remove("3");
    app.state
        .index
        .reindex_all(app.plex.as_ref(), &app.state.partitions, 3600)
        .await
        .unwrap();

    let resp = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "mode": "unwatched", "category": "movie", "username": "alice" }))
        .await;
    resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "too_many_attempts");
    assert_eq!(
        body["error"]["message"],
        "Sorry, it took too long to find something for you."
    );
}

#[tokio::test]
async fn stale_pick_is_reported_unavailable() {
    let app = test_app().await;
    // gone from the server but not yet reindexed
    app.plex.remove("1");
    app.plex.remove("2");
    app.plex.remove("3");

    let resp = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "mode": "plain", "category": "movie" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["available"], false);
    assert!(body["link"].is_null());
}

#[tokio::test]
async fn reindex_job_runs_to_completion() {
    let app = test_app().await;
    app.plex.items.lock().unwrap().push(movie("4", "D"));

    let resp = app.server.post("/api/v1/reindex").await;
    resp.assert_status(StatusCode::ACCEPTED);
    let job: Value = resp.json();
    assert_eq!(job["kind"], "reindex");
    let job_id = job["id"].as_str().unwrap().to_string();

    let mut status = String::new();
    let mut body = Value::Null;
    for _ in 0..50 {
        let resp = app.server.get(&format!("/api/v1/jobs/{job_id}")).await;
        resp.assert_status_ok();
        body = resp.json();
        status = body["status"].as_str().unwrap_or_default().to_string();
        if status == "completed" || status == "failed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert_eq!(status, "completed");
    assert_eq!(body["payload"]["partitions"][0]["partition"], "movie");
    assert_eq!(body["payload"]["partitions"][0]["seen"], 4);

    let resp = app.server.get("/api/v1/jobs").await;
    resp.assert_status_ok();
    let jobs: Value = resp.json();
    assert_eq!(jobs.as_array().unwrap().len(), 1);

    let resp = app.server.get("/api/v1/partitions").await;
    let body: Value = resp.json();
    assert_eq!(body[0]["reachable_items"], 4);
}

async fn wait_for_job(app: &TestApp, job_id: &str) -> Value {
    for _ in 0..50 {
        let body: Value = app.server.get(&format!("/api/v1/jobs/{job_id}")).await.json();
        let status = body["status"].as_str().unwrap_or_default();
        if status == "completed" || status == "failed" {
            return body;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    panic!("job {job_id} did not finish");
}

#[tokio::test]
async fn back_to_back_reindexes_keep_items_reachable() {
    let app = test_app().await;

    let first: Value = app.server.post("/api/v1/reindex").await.json();
    let second: Value = app.server.post("/api/v1/reindex").await.json();

    for job in [first, second] {
        let done = wait_for_job(&app, job["id"].as_str().unwrap()).await;
        assert_eq!(done["status"], "completed");
        assert_eq!(done["payload"]["partitions"][0]["marked_unreachable"], 0);
    }

    let body: Value = app.server.get("/api/v1/partitions").await.json();
    assert_eq!(body[0]["reachable_items"], 3);
}

#[tokio::test]
async fn missing_category_asks_for_one() {
    let app = test_app().await;
    let resp = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "mode": "plain" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(
        body["error"]["message"],
        "Please include a category: 'movie', 'music'."
    );
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = test_app().await;
    let resp = app.server.get("/api/v1/jobs/nope").await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "not_found");
}
