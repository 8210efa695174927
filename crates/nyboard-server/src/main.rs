mod config;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use nyboard_api::{AppState, AppStateInner, session::TokenKeys};
use nyboard_db::{BoardStore, Database, MemoryStore};
use nyboard_gateway::connection::Heartbeat;
use nyboard_gateway::dispatcher::Dispatcher;

use crate::config::{Config, StoreLocation};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nyboard=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn BoardStore> = match &config.store {
        StoreLocation::Sqlite(path) => Arc::new(Database::open(path)?),
        StoreLocation::Memory => {
            info!("Using in-memory store; nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
    };

    let dispatcher = Dispatcher::new();
    let state: AppState = Arc::new(AppStateInner {
        store,
        tokens: TokenKeys::new(&config.token_secret),
        dispatcher: dispatcher.clone(),
        rank_policy: config.rank_policy,
        request_timeout: config.request_timeout,
    });

    let app = nyboard_api::router(state)
        .merge(nyboard_gateway::router(dispatcher, Heartbeat::default()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!(
        "nyboard listening on {} (rank policy {:?})",
        config.addr, config.rank_policy
    );

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
