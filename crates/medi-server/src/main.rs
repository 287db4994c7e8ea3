use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use medi_client::{IdentityToolkitVerifier, OpenAiGenerator};
use medi_core::stats::StatsCache;
use medi_core::traits::{DisabledGenerator, TextGenerator};
use medi_core::upload::UploadPolicy;
use medi_db::{Database, DatabaseConfig};
use medi_server::config::ServerConfig;
use medi_server::routes;
use medi_server::state::{AppState, UploadStore};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("medi=info".parse()?))
        .with_target(false)
        .init();

    let config = ServerConfig::from_env()?;
    let addr = format!("0.0.0.0:{}", config.port);

    let db = Database::connect(&DatabaseConfig::from_env()?).await?;
    db.migrate().await?;

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let verifier =
        IdentityToolkitVerifier::with_base_url(&config.identity_api_key, &config.identity_base_url)?;
    let generator: Arc<dyn TextGenerator> = match &config.ai_api_key {
        Some(key) => {
            tracing::info!(model = %config.ai_model, "AI features enabled");
            Arc::new(OpenAiGenerator::with_base_url(
                key,
                &config.ai_model,
                &config.ai_base_url,
            )?)
        }
        None => {
            tracing::warn!("MEDI_AI_API_KEY not set. AI routes will answer 503");
            Arc::new(DisabledGenerator)
        }
    };

    let state = Arc::new(AppState {
        db: db.clone(),
        stats: StatsCache::new(config.stats_ttl),
        generator,
        verifier: Arc::new(verifier),
        uploads: UploadStore {
            dir: config.upload_dir.clone(),
            policy: UploadPolicy::new(config.upload_max_bytes),
        },
        session_ttl: TimeDelta::from_std(config.session_ttl)?,
        cookie_secure: config.cookie_secure,
    });

    let cancel = CancellationToken::new();
    let sweeper = state
        .stats
        .spawn_sweeper(config.stats_sweep_interval, cancel.clone());
    let purger = spawn_session_purger(db, cancel.clone());

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;

    let _ = tokio::join!(sweeper, purger);
    tracing::info!("Background tasks stopped");

    Ok(())
}

/// Delete expired login sessions every hour until `cancel` fires.
fn spawn_session_purger(db: Database, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match db.user_repo().purge_expired_sessions(Utc::now()).await {
                        Ok(0) => {}
                        Ok(purged) => tracing::info!(purged, "Expired sessions purged"),
                        Err(e) => tracing::warn!(error = %e, "Session purge failed"),
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
    })
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
