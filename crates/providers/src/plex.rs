//! Plex Media Server client.
//!
//! Talks to the server's JSON API (`Accept: application/json`) with the
//! `X-Plex-Token` header.

use plexrecs_core::types::{CrossRefId, MediaKind, ServerItem};
use tracing::debug;

use crate::provider::MediaServer;
use crate::{ProviderError, SectionQuery};

pub struct PlexClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl PlexClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "Plex request");

        let resp = self
            .client
            .get(&url)
            .header("X-Plex-Token", &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(ProviderError::Provider(format!(
                "Plex returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| ProviderError::Provider(format!("parse JSON: {e}")))
    }

    /// The server's machine identifier, used in playback links.
    pub async fn machine_identifier(&self) -> Result<String, ProviderError> {
        let data = self.get_json("/identity", &[]).await?;
        data["MediaContainer"]["machineIdentifier"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| ProviderError::Provider("identity without machineIdentifier".into()))
    }
}

#[async_trait::async_trait]
impl MediaServer for PlexClient {
    fn name(&self) -> &str {
        "plex"
    }

    async fn list_section_items(&self, section_id: i64) -> Result<Vec<ServerItem>, ProviderError> {
        let data = self
            .get_json(
                &format!("/library/sections/{section_id}/all"),
                &[("includeGuids", "1")],
            )
            .await?;
        Ok(parse_metadata(&data, section_id))
    }

    async fn search_section(
        &self,
        section_id: i64,
        query: &SectionQuery,
    ) -> Result<Vec<ServerItem>, ProviderError> {
        let path = format!("/library/sections/{section_id}/all");
        let items = match query {
            SectionQuery::TitleYear { title, year } => {
                let year_str = year.map(|y| y.to_string());
                let mut params = vec![("includeGuids", "1"), ("title", title.as_str())];
                if let Some(ref y) = year_str {
                    params.push(("year", y));
                }
                let data = self.get_json(&path, &params).await?;
                filter_title_year(parse_metadata(&data, section_id), title, *year)
            }
            SectionQuery::Guid(id) => {
                let guid = id.to_string();
                let data = self
                    .get_json(&path, &[("includeGuids", "1"), ("guid", guid.as_str())])
                    .await?;
                filter_guid(parse_metadata(&data, section_id), id)
            }
        };
        Ok(items)
    }
}

/// Turn a `MediaContainer.Metadata` array into server items. Entries without
/// a rating key or title are skipped.
fn parse_metadata(data: &serde_json::Value, section_id: i64) -> Vec<ServerItem> {
    let Some(entries) = data["MediaContainer"]["Metadata"].as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|m| {
            let rating_key = match &m["ratingKey"] {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let title = m["title"].as_str().filter(|t| !t.is_empty())?.to_string();
            let kind = MediaKind::from_type_lossy(m["type"].as_str().unwrap_or(""));
            let year = if kind == MediaKind::Artist {
                None
            } else {
                m["year"].as_i64().and_then(|y| i32::try_from(y).ok())
            };
            let guids = m["Guid"]
                .as_array()
                .map(|gs| {
                    gs.iter()
                        .filter_map(|g| g["id"].as_str().and_then(CrossRefId::parse))
                        .collect()
                })
                .unwrap_or_default();

            Some(ServerItem {
                rating_key,
                title,
                year,
                kind,
                section_id: m["librarySectionID"].as_i64().unwrap_or(section_id),
                guids,
            })
        })
        .collect()
}

/// Plex's title filter is a substring match; keep only exact hits.
fn filter_title_year(items: Vec<ServerItem>, title: &str, year: Option<i32>) -> Vec<ServerItem> {
    items
        .into_iter()
        .filter(|i| i.title == title && (year.is_none() || i.year == year))
        .collect()
}

fn filter_guid(items: Vec<ServerItem>, id: &CrossRefId) -> Vec<ServerItem> {
    items
        .into_iter()
        .filter(|i| i.guids.contains(id))
        .collect()
}
