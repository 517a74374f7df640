//! WebSub subscription management.
//!
//! One `hub_subscriptions` row exists per distinct subscribed channel, no
//! matter how many watchlists reference it. The hub contract: a form-encoded
//! subscribe/unsubscribe POST answered with 200 or 202, followed by an async
//! verification callback that the HTTP layer answers by echoing the
//! challenge.

pub mod ingest;

use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use watchtower_core::signature;
use watchtower_db::queries::subscriptions;

const HUB_URL: &str = "https://pubsubhubbub.appspot.com/subscribe";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const RENEWAL_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
/// Leases expiring within this window are renewed by the next pass.
const RENEWAL_WINDOW_SECONDS: f64 = 24.0 * 60.0 * 60.0;

pub fn topic_url(channel_id: &str) -> String {
    format!("https://www.youtube.com/xml/feeds/videos.xml?channel_id={channel_id}")
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub request failed: {0}")]
    Http(String),
    #[error("hub rejected {mode} request with status {status}")]
    Rejected { mode: &'static str, status: u16 },
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy)]
enum HubMode {
    Subscribe,
    Unsubscribe,
}

impl HubMode {
    fn as_str(self) -> &'static str {
        match self {
            HubMode::Subscribe => "subscribe",
            HubMode::Unsubscribe => "unsubscribe",
        }
    }
}

pub struct SubscriptionManager {
    db: PgPool,
    http: reqwest::Client,
    callback_url: String,
    lease_seconds: u32,
    renewal_gate: tokio::sync::Mutex<()>,
}

impl SubscriptionManager {
    pub fn new(db: PgPool, callback_url: String, lease_seconds: u32) -> Result<Self, HubError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| HubError::Http(err.to_string()))?;
        Ok(Self {
            db,
            http,
            callback_url,
            lease_seconds,
            renewal_gate: tokio::sync::Mutex::new(()),
        })
    }

    fn lease_expiry(&self) -> Option<chrono::DateTime<Utc>> {
        (self.lease_seconds > 0)
            .then(|| Utc::now() + chrono::Duration::seconds(i64::from(self.lease_seconds)))
    }

    /// Upserts the subscription row and asks the hub to subscribe.
    ///
    /// A fresh secret is generated for a new row; an existing row keeps its
    /// secret. If the hub call fails the row stays active so the renewal
    /// pass retries it.
    pub async fn subscribe(&self, channel_id: &str) -> Result<(), HubError> {
        let secret = signature::generate_secret();
        let sub = subscriptions::upsert(
            &self.db,
            channel_id,
            i64::from(self.lease_seconds),
            self.lease_expiry(),
            &secret,
        )
        .await?;

        if let Err(err) = self
            .send_hub_request(HubMode::Subscribe, channel_id, &sub.secret)
            .await
        {
            warn!(channel_id, error = %err, "hub subscribe failed; renewal pass will retry");
        }
        Ok(())
    }

    /// Marks the subscription inactive and asks the hub to unsubscribe.
    ///
    /// The row is retained: its secret must stay resolvable for any
    /// notifications the hub already has in flight.
    pub async fn unsubscribe(&self, channel_id: &str) -> Result<(), HubError> {
        let Some(sub) = subscriptions::mark_inactive(&self.db, channel_id).await? else {
            info!(channel_id, "no subscription row to unsubscribe");
            return Ok(());
        };

        if let Err(err) = self
            .send_hub_request(HubMode::Unsubscribe, channel_id, &sub.secret)
            .await
        {
            warn!(channel_id, error = %err, "hub unsubscribe failed");
        }
        Ok(())
    }

    /// Re-issues subscribe requests for active leases expiring within 24h.
    /// Per-row failures are logged and the pass continues.
    pub async fn renew_all(&self) -> Result<(), HubError> {
        let Ok(_pass) = self.renewal_gate.try_lock() else {
            warn!("renewal pass already running; skipping");
            return Ok(());
        };

        let due = subscriptions::due_for_renewal(&self.db, RENEWAL_WINDOW_SECONDS).await?;
        if due.is_empty() {
            return Ok(());
        }
        info!(count = due.len(), "renewing hub subscriptions");

        for sub in due {
            if let Err(err) = subscriptions::renew_lease(
                &self.db,
                sub.id,
                i64::from(self.lease_seconds),
                self.lease_expiry(),
            )
            .await
            {
                error!(
                    channel_id = %sub.platform_channel_id,
                    error = %err,
                    "failed to record renewed lease"
                );
                continue;
            }

            if let Err(err) = self
                .send_hub_request(HubMode::Subscribe, &sub.platform_channel_id, &sub.secret)
                .await
            {
                error!(
                    channel_id = %sub.platform_channel_id,
                    error = %err,
                    "hub renewal failed"
                );
            }
        }
        Ok(())
    }

    /// Long-lived renewal task: one pass every 12 hours, interruptible
    /// between passes by the shutdown token.
    pub async fn run_renewal_loop(&self, shutdown: CancellationToken) {
        loop {
            if let Err(err) = self.renew_all().await {
                error!(error = %err, "subscription renewal pass failed");
            }
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("renewal loop stopped (shutdown)");
                    return;
                }
                _ = tokio::time::sleep(RENEWAL_INTERVAL) => {}
            }
        }
    }

    async fn send_hub_request(
        &self,
        mode: HubMode,
        channel_id: &str,
        secret: &str,
    ) -> Result<(), HubError> {
        let topic = topic_url(channel_id);
        let lease = self.lease_seconds.to_string();

        let mut form = vec![
            ("hub.callback", self.callback_url.as_str()),
            ("hub.mode", mode.as_str()),
            ("hub.topic", topic.as_str()),
            ("hub.secret", secret),
            ("hub.verify", "async"),
        ];
        // Lease 0 means indefinite; the hub applies its default when omitted.
        if self.lease_seconds > 0 {
            form.push(("hub.lease_seconds", lease.as_str()));
        }

        let resp = self
            .http
            .post(HUB_URL)
            .form(&form)
            .send()
            .await
            .map_err(|err| HubError::Http(err.to_string()))?;

        match resp.status().as_u16() {
            200 | 202 => {
                info!(channel_id, mode = mode.as_str(), "hub request accepted");
                Ok(())
            }
            status => Err(HubError::Rejected {
                mode: mode.as_str(),
                status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_url_interpolates_channel_id() {
        assert_eq!(
            topic_url("UCuAXFkgsw1L7xaCfnd5JJOw"),
            "https://www.youtube.com/xml/feeds/videos.xml?channel_id=UCuAXFkgsw1L7xaCfnd5JJOw"
        );
    }

    #[test]
    fn hub_modes_match_protocol_strings() {
        assert_eq!(HubMode::Subscribe.as_str(), "subscribe");
        assert_eq!(HubMode::Unsubscribe.as_str(), "unsubscribe");
    }
}
