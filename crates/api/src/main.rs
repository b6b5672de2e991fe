//! Herald notification service entrypoint.
//!
//! Runs the HTTP API, the message fan-out and the reconciliation sweeper in
//! one process sharing a single cancellation token.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use herald_common::config::AppConfig;
use herald_common::db::{create_pool, migrate};
use herald_common::redis_pool::create_redis_pool;
use herald_engine::store::{PgMessageStore, PgUserDirectory};
use herald_engine::{Dispatcher, Sweeper};
use herald_notifier::DriverRegistry;
use herald_templates::TemplateRegistry;

use herald_api::routes::create_router;
use herald_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("herald_api=info,herald_engine=info,herald_notifier=info,tower_http=info")
        }))
        .init();

    tracing::info!("Starting Herald notification service...");

    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    migrate(&pool).await?;

    let (redis_client, redis) = create_redis_pool(&config.redis_url).await?;

    let store = Arc::new(PgMessageStore::new(pool.clone(), redis, redis_client));
    let users = Arc::new(PgUserDirectory::new(pool.clone()));
    let drivers = DriverRegistry::from_config(&config)?;
    let dispatcher = Dispatcher::new(store, users, drivers, TemplateRegistry::new())
        .with_retry_backoff(Duration::from_secs(config.fanout_retry_secs));

    let cancel = CancellationToken::new();

    let fanout = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        async move {
            if let Err(e) = dispatcher.handle_messages(cancel.clone()).await {
                tracing::error!(error = %e, "Message handling failed to start");
                cancel.cancel();
            }
        }
    });

    let sweeper = Sweeper::new(
        dispatcher.clone(),
        Duration::from_secs(config.sweeper_interval_secs),
        config.sweeper_max_concurrency,
    );
    let sweep = tokio::spawn({
        let cancel = cancel.clone();
        async move { sweeper.run(cancel).await }
    });

    let addr: SocketAddr = config.http_addr.parse()?;
    let state = AppState::new(pool, dispatcher);
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("API server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    for (name, task) in [("fanout", fanout), ("sweeper", sweep)] {
        if let Err(e) = task.await {
            tracing::error!(task = name, error = %e, "Background task panicked");
        }
    }

    tracing::info!("Herald stopped");
    Ok(())
}

/// Resolve on Ctrl-C, SIGTERM or an internal cancellation, then cancel `cancel`.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
        _ = cancel.cancelled() => tracing::info!("Internal shutdown requested"),
    }

    cancel.cancel();
}
