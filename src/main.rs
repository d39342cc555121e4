mod config;
mod domain;
mod error;
mod export;
mod query_api;
mod steam_client;
mod storage;
mod sync;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use migration::MigratorTrait;
use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use query_api::{GameQueryApi, cache::SnapshotCache};
use sea_orm::Database;
use steam_client::SteamClient;
use storage::SeaOrmStore;
use sync::{SyncOrchestrator, progress::ProgressTracker, reconciler::Reconciler};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

type CatalogResult<T> = anyhow::Result<T>;

#[derive(Debug, Parser)]
#[command(version, about = "Steam catalog sync and query service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one bounded sync against the upstream catalog
    Sync,
    /// Serve the query API over HTTP
    Serve,
    /// Write the stored catalog to a JSON file
    Export {
        #[arg(long, default_value = "games.json")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> CatalogResult<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, default to info for our crate and warn for deps.
    let default_filter = format!(
        "{}=info,poem=info,reqwest=warn,sqlx=warn,h2=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        command = ?cli.command,
        "starting steam catalog sync"
    );

    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let db_conn = Database::connect(&config.db_connection_string)
        .await
        .with_context(|| "Failed to connect to database")?;
    migration::Migrator::up(&db_conn, None)
        .await
        .with_context(|| "Failed to run database migrations")?;
    let store = Arc::new(SeaOrmStore::new(Arc::new(db_conn)));

    match cli.command {
        Command::Sync => run_sync(config, store).await,
        Command::Serve => run_poem(Arc::new(config), store).await,
        Command::Export { out } => {
            export::export_catalog(store.as_ref(), &out).await?;
            Ok(())
        }
    }
}

async fn run_sync(config: Config, store: Arc<SeaOrmStore>) -> CatalogResult<()> {
    let client = SteamClient::new(config.steam.clone())?;
    tracing::info!(
        api_base = %config.steam.api_base,
        region = %config.steam.region,
        batch_size = config.sync.batch_size,
        max_runtime_secs = config.sync.max_runtime.as_secs(),
        "configured sync run"
    );
    let mut orchestrator = SyncOrchestrator::new(
        Arc::new(client),
        Reconciler::new(store.clone()),
        ProgressTracker::new(store),
        config.sync,
    );
    match orchestrator.run().await {
        Ok(report) => {
            tracing::info!(?report, "sync complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "sync run failed");
            Err(e).context("Sync run failed")
        }
    }
}

pub async fn run_poem(config: Arc<Config>, store: Arc<SeaOrmStore>) -> CatalogResult<()> {
    let version = env!("CARGO_PKG_VERSION");
    let api = GameQueryApi {
        repo: store,
        cache: Arc::new(SnapshotCache::new(config.query.cache_ttl)),
        config: Arc::new(config.query.clone()),
    };
    let api_service = OpenApiService::new(api, "Steam Catalog API", version)
        .server(format!("http://{}", config.bind_addr));
    let ui = api_service.rapidoc();
    let spec = api_service.spec();
    let route = Route::new()
        .nest("/", api_service)
        .nest("/ui", ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
        .with(Cors::new())
        .with(PoemTracing);

    let bind_addr = config.bind_addr.as_str();
    tracing::info!(%bind_addr, "starting HTTP server");
    Server::new(TcpListener::bind(bind_addr)).run(route).await?;
    Ok(())
}
