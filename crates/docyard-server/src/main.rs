//! `docyard` server entry point.
//!
//! Connects the store (retrying while the database comes up), applies
//! migrations, prepares the static root, then serves the status endpoint and
//! project docs until a shutdown signal arrives.

use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use docyard_core::{DocService, DocStore, MemoryStore, PostgresStore, migrations};
use docyard_storage::StaticFiles;

use docyard_server::config::{ServerConfig, StoreBackendType};
use docyard_server::routes;
use docyard_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(store = ?config.store, static_root = %config.static_root.display(), "docyard starting");

    let state = build_app_state(&config).await?;

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "docyard listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("docyard stopped");
    Ok(())
}

async fn build_app_state(config: &ServerConfig) -> anyhow::Result<Arc<AppState>> {
    let (store, store_kind): (Arc<dyn DocStore>, &'static str) = match &config.store {
        StoreBackendType::Memory => {
            info!("using in-memory store (data will not persist)");
            let store: Arc<dyn DocStore> = Arc::new(MemoryStore::new());
            (store, "memory")
        }
        StoreBackendType::Postgres { url } => {
            let store = PostgresStore::connect_with_retry(
                url,
                config.max_connections,
                config.connect_attempts,
            )
            .await
            .context("failed to connect to the database")?;

            if config.migrate {
                migrations::migrate(store.pool())
                    .await
                    .context("failed to migrate the database schema")?;
            }
            let store: Arc<dyn DocStore> = Arc::new(store);
            (store, "postgres")
        }
    };

    let files = StaticFiles::new(&config.static_root).with_context(|| {
        format!(
            "failed to prepare static root {}",
            config.static_root.display()
        )
    })?;

    Ok(Arc::new(AppState::new(DocService::new(store, files), store_kind)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
