//! Tautulli watch-history client (API v2).

use std::collections::HashSet;

use tracing::debug;

use crate::provider::HistoryProvider;
use crate::{HistoryLookup, ProviderError};

/// Upper bound on history rows fetched per section.
const HISTORY_LENGTH: &str = "10000";

pub struct TautulliClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl TautulliClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Run one API command and return its `response.data`.
    async fn command(
        &self,
        cmd: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, ProviderError> {
        let mut all_params = vec![("apikey", self.api_key.as_str()), ("cmd", cmd)];
        all_params.extend_from_slice(params);

        let url = format!("{}/api/v2", self.base_url);
        debug!(url = %url, cmd, "Tautulli request");

        let resp = self
            .client
            .get(&url)
            .query(&all_params)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ProviderError::Provider(format!(
                "Tautulli returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Provider(format!("parse JSON: {e}")))?;
        unwrap_response(body)
    }
}

#[async_trait::async_trait]
impl HistoryProvider for TautulliClient {
    fn name(&self) -> &str {
        "tautulli"
    }

    async fn watched_titles(
        &self,
        username: &str,
        section_ids: &[i64],
    ) -> Result<HistoryLookup, ProviderError> {
        let users = self.command("get_users", &[]).await?;
        let Some(user_id) = find_user_id(&users, username) else {
            return Ok(HistoryLookup::UserNotFound);
        };

        let mut watched = HashSet::new();
        for section_id in section_ids {
            let section = section_id.to_string();
            let history = self
                .command(
                    "get_history",
                    &[
                        ("user_id", user_id.as_str()),
                        ("section_id", section.as_str()),
                        ("length", HISTORY_LENGTH),
                    ],
                )
                .await?;
            collect_titles(&history, &mut watched);
        }

        debug!(username, titles = watched.len(), "history loaded");
        Ok(HistoryLookup::Watched(watched))
    }
}

fn unwrap_response(body: serde_json::Value) -> Result<serde_json::Value, ProviderError> {
    let response = &body["response"];
    if response["result"].as_str() != Some("success") {
        let message = response["message"].as_str().unwrap_or("unknown error");
        return Err(ProviderError::Provider(format!("Tautulli: {message}")));
    }
    Ok(response["data"].clone())
}

/// Usernames are matched exactly.
fn find_user_id(users: &serde_json::Value, username: &str) -> Option<String> {
    users.as_array()?.iter().find_map(|u| {
        if u["username"].as_str() != Some(username) {
            return None;
        }
        match &u["user_id"] {
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) => Some(s.clone()),
            _ => None,
        }
    })
}

/// Episodes count toward their show as well as their own full title.
fn collect_titles(history: &serde_json::Value, watched: &mut HashSet<String>) {
    let Some(rows) = history["data"].as_array() else {
        return;
    };
    for row in rows {
        if let Some(full_title) = row["full_title"].as_str() {
            watched.insert(full_title.to_string());
        }
        if row["media_type"].as_str() != Some("episode") {
            continue;
        }
        if let Some(show) = row["grandparent_title"].as_str().filter(|s| !s.is_empty()) {
            watched.insert(show.to_string());
        }
    }
}
