mod cli;

use crate::cli::{StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use snip_cache::LruCache;
use snip_core::Repository;
use snip_gateway::{App, AppState};
use snip_generator::RandomGenerator;
use snip_shortener::{ClickTracker, ShortenerService, ShortenerSettings, UrlCache};
use snip_storage::{InMemoryRepository, SqliteRepository};
use snip_telemetry::TelemetryConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    let _log_guard = snip_telemetry::init(
        TelemetryConfig::builder()
            .buffer(config.log_buffer)
            .build(),
    )?;

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        cache_capacity = config.cache_capacity,
        "starting gateway"
    );

    match config.storage {
        StorageBackendArg::Sqlite => {
            if let Some(dir) = config.db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(dir)
                    .await
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            let repository = Arc::new(
                SqliteRepository::connect(&config.db_path)
                    .await
                    .context("failed to open sqlite database")?,
            );
            run_server(&config, Arc::clone(&repository)).await?;
            repository.close().await;
        }
        StorageBackendArg::InMemory => {
            run_server(&config, Arc::new(InMemoryRepository::new())).await?;
        }
    }

    info!("gateway stopped");
    Ok(())
}

async fn run_server<R: Repository>(config: &CLI, repository: Arc<R>) -> anyhow::Result<()> {
    repository
        .migrate()
        .await
        .context("failed to migrate storage")?;

    let cache: Arc<UrlCache> = Arc::new(LruCache::new(config.cache_capacity));
    let clicks = Arc::new(ClickTracker::spawn(
        Arc::clone(&repository),
        config.click_buffer,
    ));
    let settings = ShortenerSettings::builder()
        .shorten_timeout(config.shorten_timeout())
        .resolve_timeout(config.resolve_timeout())
        .build();
    let service = ShortenerService::new(repository, RandomGenerator::default(), cache)
        .with_settings(settings)
        .with_click_tracker(Arc::clone(&clicks));

    let mut state = AppState::new(Arc::new(service));
    if let Some(base_url) = &config.base_url {
        state = state.with_base_url(base_url);
    }

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    clicks.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received");
}
