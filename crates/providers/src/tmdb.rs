//! TMDB (The Movie Database) rating client.
//!
//! Uses TMDB API v3: https://developer.themoviedb.org/docs

use tracing::debug;

use crate::provider::RatingProvider;
use crate::{ProviderError, year_from_date};

const BASE_URL: &str = "https://api.themoviedb.org/3";

pub struct TmdbClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn get_json(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, ProviderError> {
        let mut all_params = vec![("api_key", self.api_key.as_str())];
        all_params.extend_from_slice(params);

        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "TMDB request");

        let resp = self
            .client
            .get(&url)
            .query(&all_params)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }

        if !resp.status().is_success() {
            return Err(ProviderError::Provider(format!(
                "TMDB returned {}",
                resp.status()
            )));
        }

        resp.json()
            .await
            .map_err(|e| ProviderError::Provider(format!("parse JSON: {e}")))
    }
}

#[async_trait::async_trait]
impl RatingProvider for TmdbClient {
    fn name(&self) -> &str {
        "tmdb"
    }

    async fn rating(&self, title: &str, year: Option<i32>) -> Result<Option<f64>, ProviderError> {
        let data = self
            .get_json("/search/multi", &[("query", title), ("include_adult", "false")])
            .await?;
        Ok(pick_rating(&data, year))
    }
}

/// Community rating of the best movie/tv hit in a `/search/multi` response.
/// A hit whose year matches wins over the first hit. Titles nobody has voted
/// on have no rating.
fn pick_rating(data: &serde_json::Value, year: Option<i32>) -> Option<f64> {
    let results = data["results"].as_array()?;
    let hits: Vec<&serde_json::Value> = results
        .iter()
        .filter(|r| matches!(r["media_type"].as_str(), Some("movie") | Some("tv")))
        .collect();

    let best = year
        .and_then(|y| hits.iter().find(|r| hit_year(r) == Some(y)))
        .or_else(|| hits.first())?;

    if best["vote_count"].as_u64() == Some(0) {
        return None;
    }
    best["vote_average"].as_f64()
}

fn hit_year(r: &serde_json::Value) -> Option<i32> {
    year_from_date(
        r["release_date"]
            .as_str()
            .or_else(|| r["first_air_date"].as_str()),
    )
}
