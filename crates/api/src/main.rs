mod cookies;
mod error;
mod middleware;
mod routes;
mod state;
mod tasks;

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use watchtower_core::config::Settings;
use watchtower_core::password;
use watchtower_core::tokens::TokenSigner;
use watchtower_db::queries::{users, watchlists};
use watchtower_db::PgPool;
use watchtower_hub::SubscriptionManager;
use watchtower_platform::YouTubeClient;

use crate::middleware::request_id::request_id;
use crate::state::AppState;

const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let settings = Settings::from_env()?;

    let db = watchtower_db::connect(&settings.database.url()).await?;
    watchtower_db::run_migrations(&db).await?;
    bootstrap_superuser(&db, &settings).await?;

    let tokens = Arc::new(TokenSigner::new(settings.jwt_secret.as_bytes()));

    let platform = match settings.youtube.api_key.clone() {
        Some(key) => Some(Arc::new(YouTubeClient::new(key)?)),
        None => {
            warn!("YOUTUBE_API_KEY not set; channel resolution disabled");
            None
        }
    };

    let hub = match (platform.is_some(), settings.youtube.callback_url.clone()) {
        (true, Some(callback_url)) => {
            info!(
                lease_seconds = settings.youtube.lease_seconds,
                "websub enabled"
            );
            Some(Arc::new(SubscriptionManager::new(
                db.clone(),
                callback_url,
                settings.youtube.lease_seconds,
            )?))
        }
        _ => {
            warn!("websub disabled (needs YOUTUBE_API_KEY and YOUTUBE_WEBSUB_CALLBACK_URL)");
            None
        }
    };

    let shutdown = CancellationToken::new();

    if let Some(hub) = hub.clone() {
        let token = shutdown.clone();
        tokio::spawn(async move { hub.run_renewal_loop(token).await });
    }
    tokio::spawn(tasks::revoked_token_sweep_loop(db.clone(), shutdown.clone()));

    let state = AppState {
        db,
        settings: settings.clone(),
        tokens,
        platform,
        hub,
    };

    let app = routes::router(state)
        .layer(from_fn(request_id))
        .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

    let addr: SocketAddr = format!("0.0.0.0:{}", settings.port).parse()?;
    info!(%addr, "starting api");
    let listener = TcpListener::bind(addr).await?;

    tokio::spawn(watch_for_shutdown_signal(shutdown.clone()));

    let drain = shutdown.clone();
    let server =
        axum::serve(listener, app).with_graceful_shutdown(async move { drain.cancelled().await });

    tokio::select! {
        result = server.into_future() => result?,
        _ = deadline_after_shutdown(shutdown) => {
            warn!("graceful shutdown deadline exceeded; aborting remaining connections");
        }
    }

    Ok(())
}

/// The bootstrap account is created once, right after the first migration.
async fn bootstrap_superuser(db: &PgPool, settings: &Settings) -> anyhow::Result<()> {
    if users::get_by_identifier(db, &settings.superuser.username)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let password = settings.superuser.password.clone();
    let hash = tokio::task::spawn_blocking(move || password::hash(&password)).await??;

    let user = users::create(
        db,
        &settings.superuser.email,
        &settings.superuser.username,
        &hash,
    )
    .await?;
    watchlists::create_default(db, user.id).await?;

    info!(username = %settings.superuser.username, "superuser account created");
    Ok(())
}

async fn watch_for_shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
    token.cancel();
}

async fn deadline_after_shutdown(token: CancellationToken) {
    token.cancelled().await;
    tokio::time::sleep(SHUTDOWN_DEADLINE).await;
}
