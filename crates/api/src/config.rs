use std::str::FromStr;
use std::time::Duration;

use capacity_core::rate_limit::RateLimitPolicy;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// `true` when `APP_ENV=production`; turns on the cookie `Secure` attribute.
    pub production: bool,
    /// Take the client address from the first `X-Forwarded-For` hop.
    pub trust_proxy_headers: bool,
    /// Minimum accepted password length.
    pub password_min_length: usize,
    pub session: SessionConfig,
    pub rate_limits: RateLimitConfig,
}

/// Session lifetime, cookie, and store settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default session lifetime (default: 24 hours).
    pub ttl: chrono::Duration,
    /// Cookie that carries the session token (default: `sessionToken`).
    pub cookie_name: String,
    /// Period of the expired-session sweep (default: 1 hour).
    pub cleanup_interval: Duration,
    /// Deadline for a single store call (default: 5 seconds).
    pub store_timeout: Duration,
}

/// One policy per gated action family.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login: RateLimitPolicy,
    pub password_update: RateLimitPolicy,
    pub account_creation: RateLimitPolicy,
    pub general_api: RateLimitPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::hours(24),
            cookie_name: "sessionToken".to_string(),
            cleanup_interval: Duration::from_secs(3600),
            store_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login: RateLimitPolicy::new("login", 5, Duration::from_secs(15 * 60)),
            password_update: RateLimitPolicy::new("password_update", 3, Duration::from_secs(30 * 60)),
            account_creation: RateLimitPolicy::new("account_creation", 2, Duration::from_secs(3600)),
            general_api: RateLimitPolicy::new("general_api", 100, Duration::from_secs(15 * 60)),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `HOST`                          | `0.0.0.0`               |
    /// | `PORT`                          | `3000`                  |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                    |
    /// | `APP_ENV`                       | `development`           |
    /// | `TRUST_PROXY_HEADERS`           | `false`                 |
    /// | `PASSWORD_MIN_LENGTH`           | `8`                     |
    /// | `SESSION_TTL_HOURS`             | `24`                    |
    /// | `SESSION_COOKIE_NAME`           | `sessionToken`          |
    /// | `SESSION_CLEANUP_INTERVAL_SECS` | `3600`                  |
    /// | `STORE_TIMEOUT_MS`              | `5000`                  |
    /// | `RATE_LIMIT_LOGIN_MAX`          | `5`                     |
    /// | `RATE_LIMIT_LOGIN_WINDOW_SECS`  | `900`                   |
    /// | `RATE_LIMIT_PASSWORD_MAX`       | `3`                     |
    /// | `RATE_LIMIT_PASSWORD_WINDOW_SECS` | `1800`                |
    /// | `RATE_LIMIT_SIGNUP_MAX`         | `2`                     |
    /// | `RATE_LIMIT_SIGNUP_WINDOW_SECS` | `3600`                  |
    /// | `RATE_LIMIT_API_MAX`            | `100`                   |
    /// | `RATE_LIMIT_API_WINDOW_SECS`    | `900`                   |
    ///
    /// # Panics
    ///
    /// Panics if a numeric variable is set but does not parse; misconfiguration
    /// should fail at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", 30);

        let production = std::env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let session = SessionConfig {
            ttl: chrono::Duration::hours(env_or("SESSION_TTL_HOURS", 24)),
            cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "sessionToken".into()),
            cleanup_interval: Duration::from_secs(env_or("SESSION_CLEANUP_INTERVAL_SECS", 3600)),
            store_timeout: Duration::from_millis(env_or("STORE_TIMEOUT_MS", 5000)),
        };

        let defaults = RateLimitConfig::default();
        let rate_limits = RateLimitConfig {
            login: policy_from_env("LOGIN", defaults.login),
            password_update: policy_from_env("PASSWORD", defaults.password_update),
            account_creation: policy_from_env("SIGNUP", defaults.account_creation),
            general_api: policy_from_env("API", defaults.general_api),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            production,
            trust_proxy_headers: env_or("TRUST_PROXY_HEADERS", false),
            password_min_length: env_or("PASSWORD_MIN_LENGTH", 8),
            session,
            rate_limits,
        }
    }
}

/// Read `name` from the environment, falling back to `default` when unset.
fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid value: {e}")),
        Err(_) => default,
    }
}

/// Override a policy's limit and window from `RATE_LIMIT_{prefix}_MAX` and
/// `RATE_LIMIT_{prefix}_WINDOW_SECS`. Panics on a degenerate policy.
fn policy_from_env(prefix: &str, default: RateLimitPolicy) -> RateLimitPolicy {
    let policy = RateLimitPolicy {
        name: default.name,
        max_requests: env_or(&format!("RATE_LIMIT_{prefix}_MAX"), default.max_requests),
        window: Duration::from_secs(env_or(
            &format!("RATE_LIMIT_{prefix}_WINDOW_SECS"),
            default.window.as_secs(),
        )),
    };
    if let Err(e) = policy.validate() {
        panic!("RATE_LIMIT_{prefix}_* is invalid: {e}");
    }
    policy
}
