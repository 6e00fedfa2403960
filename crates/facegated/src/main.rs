use anyhow::{Context, Result};
use facegate_audit::AuditStore;
use facegate_core::{FirstMatchMatcher, Gallery};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod engine;
mod gate;
mod history;
mod pages;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config::Config::load().context("loading configuration")?;
    tracing::info!(
        bind = %config.bind_addr,
        gallery = %config.gallery_dir.display(),
        models = %config.model_dir.display(),
        db = %config.db_path.display(),
        tolerance = config.tolerance,
        mode = ?config.detection_mode,
        "facegated starting"
    );

    let audit = AuditStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening audit store {}", config.db_path.display()))?;

    // Gallery must be complete before the listener binds.
    let mut encoder = facegate_core::load_encoder(&config.model_dir, config.detection_mode)
        .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
    let gallery = Gallery::load(&config.gallery_dir, &mut encoder)?;
    tracing::info!(identities = gallery.len(), "gallery ready");

    let engine = engine::spawn_engine(
        Box::new(encoder),
        Arc::new(gallery),
        FirstMatchMatcher::new(config.tolerance),
        config.engine_queue,
    )?;

    let app = api::router(
        api::AppState {
            engine,
            audit: audit.clone(),
        },
        config.secure_cookies,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "facegated ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("facegated shutting down");
    audit.close().await?;
    Ok(())
}
