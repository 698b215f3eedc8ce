//! Trakt.tv public list client.
//!
//! Uses Trakt API v2: https://trakt.docs.apiary.io

use plexrecs_core::types::CrossRefId;
use tracing::debug;

use crate::provider::ListProvider;
use crate::{ListMember, ProviderError};

const BASE_URL: &str = "https://api.trakt.tv";

/// One configured public list, `owner/slug`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRef {
    pub owner: String,
    pub slug: String,
}

/// The public lists users may ask for, by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRegistry {
    lists: Vec<ListRef>,
}

impl ListRegistry {
    /// Parse `owner/slug` entries. Blank entries are ignored.
    pub fn parse(entries: &[String]) -> Result<Self, String> {
        let mut lists = Vec::new();
        for entry in entries.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            let (owner, slug) = entry
                .split_once('/')
                .filter(|(o, s)| !o.is_empty() && !s.is_empty() && !s.contains('/'))
                .ok_or_else(|| format!("trakt list must be owner/slug, got {entry:?}"))?;
            lists.push(ListRef {
                owner: owner.to_string(),
                slug: slug.to_string(),
            });
        }
        Ok(Self { lists })
    }

    /// Look up by slug or by full `owner/slug`. The first configured owner
    /// wins when several share a slug.
    pub fn find(&self, name: &str) -> Option<&ListRef> {
        match name.split_once('/') {
            Some((owner, slug)) => self
                .lists
                .iter()
                .find(|l| l.owner == owner && l.slug == slug),
            None => self.lists.iter().find(|l| l.slug == name),
        }
    }

    pub fn slugs(&self) -> Vec<&str> {
        self.lists.iter().map(|l| l.slug.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

pub struct TraktClient {
    client_id: String,
    base_url: String,
    registry: ListRegistry,
    client: reqwest::Client,
}

impl TraktClient {
    pub fn new(client_id: String, registry: ListRegistry) -> Self {
        Self::with_base_url(client_id, registry, BASE_URL.to_string())
    }

    pub fn with_base_url(client_id: String, registry: ListRegistry, base_url: String) -> Self {
        Self {
            client_id,
            base_url: base_url.trim_end_matches('/').to_string(),
            registry,
            client: reqwest::Client::new(),
        }
    }

    pub fn registry(&self) -> &ListRegistry {
        &self.registry
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "Trakt request");

        let resp = self
            .client
            .get(&url)
            .header("trakt-api-version", "2")
            .header("trakt-api-key", &self.client_id)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(ProviderError::Provider(format!(
                "Trakt returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| ProviderError::Provider(format!("parse JSON: {e}")))
    }
}

#[async_trait::async_trait]
impl ListProvider for TraktClient {
    fn name(&self) -> &str {
        "trakt"
    }

    async fn list_members(&self, list_name: &str) -> Result<Vec<ListMember>, ProviderError> {
        let Some(list) = self.registry.find(list_name) else {
            return Err(ProviderError::NotFound);
        };
        let data = self
            .get_json(&format!("/users/{}/lists/{}/items", list.owner, list.slug))
            .await?;
        Ok(parse_items(&data))
    }
}

/// Movie and show entries of a list. Seasons, episodes and people are
/// skipped.
fn parse_items(data: &serde_json::Value) -> Vec<ListMember> {
    let Some(entries) = data.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let kind = entry["type"].as_str()?;
            if kind != "movie" && kind != "show" {
                return None;
            }
            let media = &entry[kind];
            let title = media["title"].as_str().filter(|t| !t.is_empty())?;
            Some(ListMember {
                title: title.to_string(),
                year: media["year"].as_i64().and_then(|y| i32::try_from(y).ok()),
                cross_ref_ids: cross_refs(&media["ids"]),
            })
        })
        .collect()
}

fn cross_refs(ids: &serde_json::Value) -> Vec<CrossRefId> {
    ["imdb", "tmdb", "tvdb"]
        .iter()
        .filter_map(|source| {
            let value = match &ids[*source] {
                serde_json::Value::String(s) if !s.is_empty() => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some(CrossRefId::new(*source, value))
        })
        .collect()
}
