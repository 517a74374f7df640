//! Refresh-token cookie lifecycle.
//!
//! The refresh token only ever travels in an HttpOnly cookie. Production
//! hardens it to `Secure` + `SameSite=Strict`; development keeps
//! `SameSite=Lax` so a local frontend on another port can authenticate.

use axum::http::{header::COOKIE, HeaderMap};
use chrono::{DateTime, Utc};
use cookie::{Cookie, SameSite};

use watchtower_core::config::Settings;

pub const REFRESH_COOKIE: &str = "refresh_token";

pub fn refresh_cookie(settings: &Settings, token: &str, expires_at: DateTime<Utc>) -> String {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    build(settings, token.to_string(), max_age).to_string()
}

pub fn clear_refresh_cookie(settings: &Settings) -> String {
    build(settings, String::new(), -1).to_string()
}

fn build(settings: &Settings, value: String, max_age_seconds: i64) -> Cookie<'static> {
    let production = settings.app_env.is_production();
    Cookie::build((REFRESH_COOKIE, value))
        .http_only(true)
        .path("/")
        .domain(settings.app_domain.clone())
        .max_age(cookie::time::Duration::seconds(max_age_seconds))
        .secure(production)
        .same_site(if production {
            SameSite::Strict
        } else {
            SameSite::Lax
        })
        .build()
}

pub fn read_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    Cookie::split_parse(raw)
        .filter_map(Result::ok)
        .find(|c| c.name() == REFRESH_COOKIE)
        .map(|c| c.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use watchtower_core::config::{
        DatabaseSettings, Environment, SuperuserSettings, YouTubeSettings,
    };

    fn settings(env: Environment) -> Settings {
        Settings {
            database: DatabaseSettings {
                host: "localhost".to_string(),
                user: "postgres".to_string(),
                password: "postgres".to_string(),
                name: "watchtower".to_string(),
                port: "5432".to_string(),
            },
            jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            app_env: env,
            app_domain: "example.com".to_string(),
            port: "8080".to_string(),
            superuser: SuperuserSettings {
                username: "admin".to_string(),
                email: "admin@example.com".to_string(),
                password: "password".to_string(),
            },
            youtube: YouTubeSettings {
                api_key: None,
                callback_url: None,
                lease_seconds: 0,
            },
        }
    }

    #[test]
    fn production_cookie_is_hardened() {
        let header = refresh_cookie(
            &settings(Environment::Production),
            "tok",
            Utc::now() + Duration::days(7),
        );
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("SameSite=Strict"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Domain=example.com"));
    }

    #[test]
    fn development_cookie_is_lax_and_not_secure() {
        let header = refresh_cookie(
            &settings(Environment::Development),
            "tok",
            Utc::now() + Duration::days(7),
        );
        assert!(header.contains("HttpOnly"));
        assert!(!header.contains("Secure"));
        assert!(header.contains("SameSite=Lax"));
    }

    #[test]
    fn max_age_tracks_refresh_expiry() {
        let header = refresh_cookie(
            &settings(Environment::Development),
            "tok",
            Utc::now() + Duration::days(7),
        );
        let max_age: i64 = header
            .split("Max-Age=")
            .nth(1)
            .and_then(|rest| rest.split(';').next())
            .and_then(|v| v.parse().ok())
            .unwrap();
        assert!(max_age > 6 * 24 * 60 * 60);
        assert!(max_age <= 7 * 24 * 60 * 60);
    }

    #[test]
    fn expired_refresh_yields_zero_max_age() {
        let header = refresh_cookie(
            &settings(Environment::Development),
            "tok",
            Utc::now() - Duration::hours(1),
        );
        assert!(header.contains("Max-Age=0"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let header = clear_refresh_cookie(&settings(Environment::Development));
        assert!(header.starts_with("refresh_token="));
        assert!(header.contains("Max-Age=-1") || header.contains("Max-Age=0"));
    }

    #[test]
    fn reads_cookie_from_multi_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            "theme=dark; refresh_token=abc.def.ghi; other=1".parse().unwrap(),
        );
        assert_eq!(read_refresh_cookie(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_cookie_is_none() {
        assert_eq!(read_refresh_cookie(&HeaderMap::new()), None);
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "theme=dark".parse().unwrap());
        assert_eq!(read_refresh_cookie(&headers), None);
    }
}
