use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_ranking::cache::TtlCache;
use feed_ranking::config::{Config, StoreBackend};
use feed_ranking::handlers::{configure, AppState};
use feed_ranking::store::{FeedStore, InMemoryFeedStore, PgFeedStore};
use feed_ranking::FeedOrchestrator;

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn FeedStore>> {
    match config.database.backend {
        StoreBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            let store = PgFeedStore::connect(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            info!(
                max_connections = config.database.max_connections,
                "Postgres feed store ready"
            );
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory feed store");
            Ok(Arc::new(InMemoryFeedStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting {} v{}",
        config.app.service_name,
        env!("CARGO_PKG_VERSION")
    );
    info!("Environment: {}", config.app.env);

    let store = match build_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!("Feed store initialization failed: {:#}", e);
            eprintln!("ERROR: Failed to initialize feed store: {:#}", e);
            std::process::exit(1);
        }
    };

    let ranking = Arc::new(config.ranking.clone());
    let profile_cache = Arc::new(TtlCache::new(
        ranking.profile_cache_ttl(),
        ranking.profile_cache_max_entries,
    ));
    let orchestrator = Arc::new(FeedOrchestrator::new(
        store,
        Arc::clone(&ranking),
        config.weights,
        profile_cache,
    ));
    let state = web::Data::new(AppState { orchestrator });

    info!(
        max_candidates = ranking.max_candidates,
        deadline_ms = ranking.request_deadline_ms,
        "Ranking configuration loaded"
    );

    let bind_addr = format!("0.0.0.0:{}", config.app.port);
    info!("HTTP server listening on {}", bind_addr);

    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind(&bind_addr)?
        .run()
        .await
}
