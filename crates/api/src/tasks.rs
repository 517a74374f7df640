//! In-process background loops, all cancellable by the shutdown token.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use watchtower_db::queries::revoked_tokens;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Prunes revocation-registry rows whose tokens have expired on their own.
pub async fn revoked_token_sweep_loop(db: PgPool, shutdown: CancellationToken) {
    loop {
        match revoked_tokens::sweep_expired(&db).await {
            Ok(0) => {}
            Ok(count) => info!(count, "pruned expired revoked tokens"),
            Err(err) => error!(error = %err, "revoked-token sweep failed"),
        }
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("revoked-token sweep stopped (shutdown)");
                return;
            }
            _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
        }
    }
}
