use std::sync::Arc;

use anyhow::Context;
use plexrecs_bot::config::Config;
use plexrecs_bot::state::{AppState, PlexLink};
use plexrecs_index::ContentIndex;
use plexrecs_picker::{Picker, Resolver};
use plexrecs_providers::plex::PlexClient;
use plexrecs_providers::tautulli::TautulliClient;
use plexrecs_providers::tmdb::TmdbClient;
use plexrecs_providers::trakt::{ListRegistry, TraktClient};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let partitions = config.partitions()?;

    info!(db_path = %config.db, "connecting to database");
    let pool = plexrecs_db::connect(&config.db)
        .await
        .context("failed to connect to database")?;

    plexrecs_db::migrate::run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("migrations complete");

    let abandoned = plexrecs_db::repo::jobs::fail_abandoned_jobs(&pool)
        .await
        .context("failed to clean up old jobs")?;
    if abandoned > 0 {
        warn!(abandoned, "marked jobs from a previous run as failed");
    }

    let plex = Arc::new(PlexClient::new(
        config.plex_url.clone(),
        config.plex_token.clone(),
    ));
    let machine_id = match &config.plex_server_id {
        Some(id) => Some(id.clone()),
        None => match plex.machine_identifier().await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "could not fetch Plex machine identifier; links disabled");
                None
            }
        },
    };
    let link = machine_id.map(|machine_id| PlexLink {
        base_url: plex.base_url().to_string(),
        machine_id,
    });

    let history = Arc::new(TautulliClient::new(
        config.tautulli_url.clone(),
        config.tautulli_api_key.clone(),
    ));
    let index = ContentIndex::new(pool.clone());
    let resolver = Resolver::new(plex.clone(), partitions.all_section_ids());
    let mut picker = Picker::new(
        Arc::new(index.clone()),
        partitions.clone(),
        history,
        resolver,
    );

    match &config.tmdb_api_key {
        Some(key) => picker = picker.with_ratings(Arc::new(TmdbClient::new(key.clone()))),
        None => info!("no TMDB key; rating filters disabled"),
    }

    let registry =
        ListRegistry::parse(&config.trakt_list_entries()).map_err(anyhow::Error::msg)?;
    match &config.trakt_client_id {
        Some(client_id) if !registry.is_empty() => {
            info!(lists = ?registry.slugs(), "trakt lists enabled");
            picker = picker.with_lists(Arc::new(TraktClient::new(client_id.clone(), registry)));
        }
        _ => info!("no trakt lists configured"),
    }

    let app_state = AppState {
        db: pool,
        index,
        server: plex,
        picker: Arc::new(picker),
        partitions,
        link,
        purge_after_secs: config.purge_after_secs(),
    };

    let interval = config.reindex_interval();
    info!(interval_secs = interval.as_secs(), "scheduling periodic reindex");
    plexrecs_bot::reindex_job::spawn_periodic_reindex(app_state.clone(), interval);

    let app = plexrecs_bot::routes::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .context("failed to bind")?;
    info!(addr = %config.bind, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
