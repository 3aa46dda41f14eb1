//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use yatube_core::pagination::DEFAULT_PAGE_SIZE;
use yatube_infra::JwtConfig;

#[cfg(feature = "postgres")]
use yatube_infra::DatabaseConfig;
#[cfg(feature = "redis")]
use yatube_infra::RedisConfig;
#[cfg(feature = "rate-limit")]
use yatube_infra::RateLimitConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    #[cfg(feature = "postgres")]
    pub database: Option<DatabaseConfig>,
    #[cfg(feature = "redis")]
    pub redis: Option<RedisConfig>,
    #[cfg(feature = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    pub jwt: JwtConfig,
    pub site: SiteSettings,
}

/// Settings the handlers read on every request.
#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub posts_per_page: u64,
    pub index_cache_ttl: Duration,
    pub media_root: PathBuf,
    pub media_url: String,
    pub session_cookie_name: String,
    pub session_cookie_secure: bool,
    /// Largest accepted post form body.
    pub max_upload_bytes: usize,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            posts_per_page: DEFAULT_PAGE_SIZE,
            index_cache_ttl: Duration::from_secs(20),
            media_root: PathBuf::from("media"),
            media_url: "/media/".to_string(),
            session_cookie_name: "sessionid".to_string(),
            session_cookie_secure: false,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}

impl SiteSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            posts_per_page: parsed("POSTS_PER_PAGE").unwrap_or(defaults.posts_per_page),
            index_cache_ttl: parsed("INDEX_CACHE_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.index_cache_ttl),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.media_root),
            media_url: env::var("MEDIA_URL").unwrap_or(defaults.media_url),
            session_cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or(defaults.session_cookie_name),
            session_cookie_secure: env::var("SESSION_COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.session_cookie_secure),
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT").unwrap_or(8080),
            #[cfg(feature = "postgres")]
            database: DatabaseConfig::from_env(),
            #[cfg(feature = "redis")]
            redis: env::var("REDIS_URL").ok().map(|_| RedisConfig::from_env()),
            #[cfg(feature = "rate-limit")]
            rate_limit: RateLimitConfig::from_env(),
            jwt: JwtConfig::from_env(),
            site: SiteSettings::from_env(),
        }
    }
}
