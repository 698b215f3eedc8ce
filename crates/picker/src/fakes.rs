//! In-memory collaborators for picker and resolver tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use plexrecs_core::types::{ContentItem, MediaKind, SampleScope, ServerItem};
use plexrecs_index::{CandidatePool, IndexError};
use plexrecs_providers::{
    HistoryLookup, HistoryProvider, ListMember, ListProvider, MediaServer, ProviderError,
    RatingProvider, SectionQuery,
};
use rand::seq::SliceRandom;

pub const YEAR: i32 = 1985;

pub fn content_item(key: &str, title: &str, partition: &str, kind: MediaKind) -> ContentItem {
    ContentItem {
        id: format!("id-{key}"),
        title: title.to_string(),
        year: Some(YEAR),
        external_key: key.to_string(),
        partition: partition.to_string(),
        section_id: 1,
        kind,
        cross_ref_ids: Vec::new(),
        is_reachable: true,
        last_seen_ts: 0,
    }
}

pub fn server_item(key: &str, title: &str, section_id: i64) -> ServerItem {
    ServerItem {
        rating_key: key.to_string(),
        title: title.to_string(),
        year: Some(YEAR),
        kind: MediaKind::Movie,
        section_id,
        guids: Vec::new(),
    }
}

#[derive(Default)]
pub struct FakePool {
    items: Vec<ContentItem>,
    draws: AtomicU32,
    drawn: Mutex<Vec<String>>,
}

impl FakePool {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn draws(&self) -> u32 {
        self.draws.load(Ordering::SeqCst)
    }

    /// External keys handed out so far, in draw order.
    pub fn drawn(&self) -> Vec<String> {
        self.drawn.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CandidatePool for FakePool {
    async fn sample_random_skipping(
        &self,
        scope: &SampleScope,
        skip_keys: &[String],
    ) -> Result<Option<ContentItem>, IndexError> {
        self.draws.fetch_add(1, Ordering::SeqCst);
        let in_scope: Vec<&ContentItem> = self
            .items
            .iter()
            .filter(|i| match scope {
                SampleScope::Partition(name) => &i.partition == name,
                SampleScope::Kind(kind) => i.kind == *kind,
            })
            .filter(|i| !skip_keys.contains(&i.external_key))
            .collect();
        let item = in_scope.choose(&mut rand::thread_rng()).map(|i| (*i).clone());
        if let Some(item) = &item {
            self.drawn.lock().unwrap().push(item.external_key.clone());
        }
        Ok(item)
    }

    async fn find_by_external_key(&self, key: &str) -> Result<Option<ContentItem>, IndexError> {
        Ok(self.items.iter().find(|i| i.external_key == key).cloned())
    }
}

#[derive(Default)]
pub struct FakeHistory {
    pub watched: HashMap<String, HashSet<String>>,
    pub fail: bool,
    calls: AtomicU32,
}

impl FakeHistory {
    pub fn with_user(username: &str, titles: &[&str]) -> Self {
        let mut watched = HashMap::new();
        watched.insert(
            username.to_string(),
            titles.iter().map(|t| t.to_string()).collect(),
        );
        Self {
            watched,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl HistoryProvider for FakeHistory {
    fn name(&self) -> &str {
        "fake-history"
    }

    async fn watched_titles(
        &self,
        username: &str,
        _section_ids: &[i64],
    ) -> Result<HistoryLookup, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::Network("history down".into()));
        }
        Ok(match self.watched.get(username) {
            Some(titles) => HistoryLookup::Watched(titles.clone()),
            None => HistoryLookup::UserNotFound,
        })
    }
}

/// Ratings by title. Unknown titles have no rating; titles in `failing`
/// error out.
#[derive(Default)]
pub struct FakeRatings {
    pub ratings: HashMap<String, f64>,
    pub failing: HashSet<String>,
    calls: AtomicU32,
}

impl FakeRatings {
    pub fn new(ratings: &[(&str, f64)]) -> Self {
        Self {
            ratings: ratings.iter().map(|(t, r)| (t.to_string(), *r)).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RatingProvider for FakeRatings {
    fn name(&self) -> &str {
        "fake-ratings"
    }

    async fn rating(&self, title: &str, _year: Option<i32>) -> Result<Option<f64>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(title) {
            return Err(ProviderError::Provider("rating lookup failed".into()));
        }
        Ok(self.ratings.get(title).copied())
    }
}

#[derive(Default)]
pub struct FakeLists {
    pub lists: HashMap<String, Vec<ListMember>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl ListProvider for FakeLists {
    fn name(&self) -> &str {
        "fake-lists"
    }

    async fn list_members(&self, list_name: &str) -> Result<Vec<ListMember>, ProviderError> {
        if self.fail {
            return Err(ProviderError::Network("lists down".into()));
        }
        self.lists
            .get(list_name)
            .cloned()
            .ok_or(ProviderError::NotFound)
    }
}

/// Title/year and guid search over a flat item list.
#[derive(Default)]
pub struct FakeServer {
    items: Mutex<Vec<ServerItem>>,
    failing: Mutex<HashSet<i64>>,
    title_searches: AtomicU32,
    guid_searches: AtomicU32,
}

impl FakeServer {
    pub fn add(&self, item: ServerItem) {
        self.items.lock().unwrap().push(item);
    }

    pub fn fail_section(&self, section_id: i64) {
        self.failing.lock().unwrap().insert(section_id);
    }

    pub fn title_searches(&self) -> u32 {
        self.title_searches.load(Ordering::SeqCst)
    }

    pub fn guid_searches(&self) -> u32 {
        self.guid_searches.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> u32 {
        self.title_searches() + self.guid_searches()
    }
}

#[async_trait::async_trait]
impl MediaServer for FakeServer {
    fn name(&self) -> &str {
        "fake-server"
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
        match query {
            SectionQuery::TitleYear { .. } => self.title_searches.fetch_add(1, Ordering::SeqCst),
            SectionQuery::Guid(_) => self.guid_searches.fetch_add(1, Ordering::SeqCst),
        };
        if self.failing.lock().unwrap().contains(&section_id) {
            return Err(ProviderError::Network(format!("section {section_id} down")));
        }
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .filter(|i| i.section_id == section_id)
            .filter(|i| match query {
                SectionQuery::TitleYear { title, year } => {
                    &i.title == title && (year.is_none() || i.year == *year)
                }
                SectionQuery::Guid(id) => i.guids.contains(id),
            })
            .cloned()
            .collect())
    }
}
