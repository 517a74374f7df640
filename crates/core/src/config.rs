use thiserror::Error;

pub const DEFAULT_LEASE_SECONDS: u32 = 432_000; // 5 days; the hub caps near 10

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub user: String,
    pub password: String,
    pub name: String,
    pub port: String,
}

impl DatabaseSettings {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Clone)]
pub struct SuperuserSettings {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct YouTubeSettings {
    pub api_key: Option<String>,
    pub callback_url: Option<String>,
    pub lease_seconds: u32,
}

impl YouTubeSettings {
    /// Channel resolution is available only when an API key is configured.
    pub fn api_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// WebSub needs both the API key and a publicly reachable callback URL.
    pub fn websub_enabled(&self) -> bool {
        self.api_key.is_some() && self.callback_url.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub jwt_secret: String,
    pub app_env: Environment,
    pub app_domain: String,
    pub port: String,
    pub superuser: SuperuserSettings,
    pub youtube: YouTubeSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database = DatabaseSettings {
            host: env_or("DB_HOST", "POSTGRES_HOST", "localhost"),
            user: env_or("DB_USER", "POSTGRES_USER", "postgres"),
            password: env_or("DB_PASSWORD", "POSTGRES_PASSWORD", "watchtower"),
            name: env_or("DB_NAME", "POSTGRES_DB", "watchtower"),
            port: env_or("DB_PORT", "POSTGRES_PORT", "5432"),
        };

        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: "must be at least 32 bytes".to_string(),
            });
        }

        let app_env = match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .as_str()
        {
            "development" => Environment::Development,
            "production" => Environment::Production,
            other => {
                return Err(ConfigError::Invalid {
                    key: "APP_ENV",
                    reason: format!("expected development or production, got {other}"),
                })
            }
        };

        let superuser = SuperuserSettings {
            username: std::env::var("SUPERUSER_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            email: std::env::var("SUPERUSER_EMAIL")
                .unwrap_or_else(|_| "admin@example.com".to_string()),
            password: std::env::var("SUPERUSER_PASSWORD")
                .unwrap_or_else(|_| "password".to_string()),
        };

        let lease_seconds = match std::env::var("YOUTUBE_WEBSUB_LEASE_SECONDS") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "YOUTUBE_WEBSUB_LEASE_SECONDS",
                reason: format!("not a number: {raw}"),
            })?,
            Err(_) => DEFAULT_LEASE_SECONDS,
        };

        let youtube = YouTubeSettings {
            api_key: std::env::var("YOUTUBE_API_KEY").ok().filter(|v| !v.is_empty()),
            callback_url: std::env::var("YOUTUBE_WEBSUB_CALLBACK_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            lease_seconds,
        };

        Ok(Self {
            database,
            jwt_secret,
            app_env,
            app_domain: std::env::var("APP_DOMAIN").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("PORT").unwrap_or_else(|_| "8080".to_string()),
            superuser,
            youtube,
        })
    }
}

fn env_or(key: &str, alias: &str, default: &str) -> String {
    std::env::var(key)
        .or_else(|_| std::env::var(alias))
        .unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_shape() {
        let db = DatabaseSettings {
            host: "db".to_string(),
            user: "app".to_string(),
            password: "secret".to_string(),
            name: "watchtower".to_string(),
            port: "5432".to_string(),
        };
        assert_eq!(db.url(), "postgres://app:secret@db:5432/watchtower");
    }

    #[test]
    fn websub_requires_both_key_and_callback() {
        let mut yt = YouTubeSettings {
            api_key: Some("key".to_string()),
            callback_url: None,
            lease_seconds: DEFAULT_LEASE_SECONDS,
        };
        assert!(yt.api_enabled());
        assert!(!yt.websub_enabled());

        yt.callback_url = Some("https://example.com/api/v1/pubsub/callback".to_string());
        assert!(yt.websub_enabled());

        yt.api_key = None;
        assert!(!yt.websub_enabled());
    }
}
