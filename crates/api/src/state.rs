use std::sync::Arc;

use sqlx::PgPool;

use watchtower_core::config::Settings;
use watchtower_core::tokens::TokenSigner;
use watchtower_hub::SubscriptionManager;
use watchtower_platform::YouTubeClient;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Settings,
    pub tokens: Arc<TokenSigner>,
    /// Absent when YOUTUBE_API_KEY is not configured.
    pub platform: Option<Arc<YouTubeClient>>,
    /// Absent when WebSub is not configured (needs api key + callback URL).
    pub hub: Option<Arc<SubscriptionManager>>,
}

/// Identity of the caller, injected by the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
}
