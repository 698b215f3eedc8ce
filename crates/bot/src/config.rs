use std::time::Duration;

use anyhow::Context;
use plexrecs_core::types::{LibraryPartition, LibraryPartitions};
use serde::Deserialize;

/// Shortest allowed gap between periodic reindex runs.
pub const MIN_REINDEX_INTERVAL_MINUTES: u64 = 5;

/// Configuration loaded from `PLEXRECS_`-prefixed environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// SQLite database path
    #[serde(default = "default_db")]
    pub db: String,

    /// Listen address for the HTTP surface
    #[serde(default = "default_bind")]
    pub bind: String,

    pub plex_url: String,
    pub plex_token: String,

    /// Machine identifier for playback links; fetched from the server when unset
    #[serde(default)]
    pub plex_server_id: Option<String>,

    pub tautulli_url: String,
    pub tautulli_api_key: String,

    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    #[serde(default)]
    pub trakt_client_id: Option<String>,

    /// Comma-separated `owner/slug` entries
    #[serde(default)]
    pub trakt_lists: String,

    /// Comma-separated section ids per category
    #[serde(default)]
    pub movie_libraries: String,
    #[serde(default)]
    pub show_libraries: String,
    #[serde(default)]
    pub music_libraries: String,
    #[serde(default, rename = "4k_libraries")]
    pub uhd_libraries: String,
    #[serde(default)]
    pub anime_libraries: String,

    #[serde(default = "default_reindex_interval_minutes")]
    pub reindex_interval_minutes: u64,

    /// How long an unreachable item is kept before purge
    #[serde(default = "default_purge_after_hours")]
    pub purge_after_hours: u64,
}

fn default_db() -> String {
    "plexrecs.db".to_string()
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_reindex_interval_minutes() -> u64 {
    60
}

fn default_purge_after_hours() -> u64 {
    168
}

impl Config {
    /// Load configuration from the environment, reading `.env` first if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::prefixed("PLEXRECS_")
            .from_env::<Config>()
            .context("failed to load config")
    }

    pub fn from_vars<I>(vars: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed("PLEXRECS_")
            .from_iter::<_, Config>(vars)
            .context("failed to load config")
    }

    /// The configured category partitions, in a fixed order.
    pub fn partitions(&self) -> anyhow::Result<LibraryPartitions> {
        let raw = [
            ("movie", &self.movie_libraries),
            ("show", &self.show_libraries),
            ("music", &self.music_libraries),
            ("4k", &self.uhd_libraries),
            ("anime", &self.anime_libraries),
        ];

        let mut partitions = Vec::with_capacity(raw.len());
        for (name, ids) in raw {
            partitions.push(LibraryPartition {
                name: name.to_string(),
                section_ids: parse_section_ids(ids)
                    .with_context(|| format!("invalid {name} library list"))?,
            });
        }

        let partitions = LibraryPartitions::new(partitions).context("invalid library partitions")?;
        if partitions.is_empty() {
            anyhow::bail!("no libraries configured");
        }
        Ok(partitions)
    }

    pub fn reindex_interval(&self) -> Duration {
        let minutes = self.reindex_interval_minutes.max(MIN_REINDEX_INTERVAL_MINUTES);
        Duration::from_secs(minutes * 60)
    }

    pub fn purge_after_secs(&self) -> i64 {
        i64::try_from(self.purge_after_hours.saturating_mul(3600)).unwrap_or(i64::MAX)
    }

    pub fn trakt_list_entries(&self) -> Vec<String> {
        split_list(&self.trakt_lists).map(String::from).collect()
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_section_ids(raw: &str) -> anyhow::Result<Vec<i64>> {
    split_list(raw)
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("not a section id: {s:?}"))
        })
        .collect()
}
