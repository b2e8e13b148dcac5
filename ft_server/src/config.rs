//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use axum::http::HeaderValue;
use fintrack::{
    auth::{
        Algorithm, AuthSettings, PasswordPolicyLevel, TokenLifetimes,
        password::{DEFAULT_HASH_MEMORY_KIB, DEFAULT_HASH_ROUNDS},
    },
    db::DatabaseConfig,
    email::{RetryPolicy, SmtpConfig},
};
use std::{fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_BIND: &str = "127.0.0.1:8000";
const DEFAULT_DATABASE_URL: &str = "postgres://postgres@localhost/fintrack";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_EMAIL_FROM: &str = "FinTrack <no-reply@fintrack.app>";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis connection URL
    pub redis_url: String,
    /// Token signing configuration
    pub jwt: JwtConfig,
    /// Password hashing and policy
    pub password: PasswordConfig,
    /// Email confirmation and delivery
    pub email: EmailConfig,
    /// Cookies, CORS and rate limiting
    pub http: HttpConfig,
    /// Prometheus exporter address, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub algorithm: Algorithm,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,
    pub reset_token_expire_minutes: i64,
}

/// Password configuration
#[derive(Debug, Clone)]
pub struct PasswordConfig {
    pub validation_level: PasswordPolicyLevel,
    /// Newline-separated list of forbidden passwords
    pub common_list_path: Option<PathBuf>,
    pub hash_rounds: u32,
    pub hash_memory_kib: u32,
}

/// Email configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub confirmation_enabled: bool,
    pub confirm_token_expire_hours: i64,
    /// Directory overriding the built-in templates
    pub templates_path: Option<PathBuf>,
    /// SMTP relay; emails are only logged when absent
    pub smtp: Option<SmtpConfig>,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Frontend base URL, used for CORS and for links in emails
    pub allowed_hosts: String,
    pub cookie_secure: bool,
    pub rate_limiter_enabled: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `redis_url_override` - Optional Redis URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        redis_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_env("SERVER_BIND", DEFAULT_BIND)?,
        };

        // Database configuration
        let database_url = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let database = DatabaseConfig {
            database_url,
            max_connections: parse_env_or("DB_MAX_CONNECTIONS", 20),
            min_connections: parse_env_or("DB_MIN_CONNECTIONS", 2),
            connection_timeout_secs: parse_env_or("DB_CONNECTION_TIMEOUT_SECS", 10),
            idle_timeout_secs: parse_env_or("DB_IDLE_TIMEOUT_SECS", 600),
            max_lifetime_secs: parse_env_or("DB_MAX_LIFETIME_SECS", 1800),
        };

        let redis_url = redis_url_override
            .or_else(|| std::env::var("REDIS_URL").ok())
            .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

        // Token keys (REQUIRED)
        let jwt = JwtConfig {
            algorithm: parse_env("JWT_ALGORITHM", "RS256")?,
            private_key_path: required_path(
                "JWT_PRIVATE_KEY_PATH",
                "Generate with: openssl genpkey -algorithm RSA -out private.pem",
            )?,
            public_key_path: required_path(
                "JWT_PUBLIC_KEY_PATH",
                "Generate with: openssl pkey -in private.pem -pubout -out public.pem",
            )?,
            access_token_expire_minutes: parse_env_or("JWT_ACCESS_TOKEN_EXPIRE", 15),
            refresh_token_expire_days: parse_env_or("JWT_REFRESH_TOKEN_EXPIRE", 7),
            reset_token_expire_minutes: parse_env_or("JWT_RESET_TOKEN_EXPIRE", 30),
        };

        let password = PasswordConfig {
            validation_level: parse_env("PASSWORD_VALIDATION_LEVEL", "medium")?,
            common_list_path: optional_env("PASSWORDS_COMMON_LIST_PATH").map(PathBuf::from),
            hash_rounds: parse_env_or("PASSWORD_HASH_ROUNDS", DEFAULT_HASH_ROUNDS),
            hash_memory_kib: parse_env_or("PASSWORD_HASH_MEMORY_KIB", DEFAULT_HASH_MEMORY_KIB),
        };

        let smtp = optional_env("SMTP_HOST").map(|host| SmtpConfig {
            host,
            port: parse_env_or("SMTP_PORT", 587),
            username: optional_env("SMTP_USERNAME"),
            password: optional_env("SMTP_PASSWORD"),
            from: optional_env("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
            starttls: parse_env_or("SMTP_STARTTLS", true),
        });

        let email = EmailConfig {
            confirmation_enabled: parse_env_or("ENABLE_EMAIL_CONFIRMATION", false),
            confirm_token_expire_hours: parse_env_or("EMAIL_CONFIRM_TOKEN_EXPIRE", 24),
            templates_path: optional_env("EMAIL_TEMPLATES_PATH").map(PathBuf::from),
            smtp,
            max_retries: parse_env_or("EMAIL_MAX_RETRIES", 3),
            retry_base_delay_ms: parse_env_or("EMAIL_RETRY_BASE_DELAY_MS", 500),
        };

        let http = HttpConfig {
            allowed_hosts: optional_env("ALLOWED_HOSTS")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            cookie_secure: parse_env_or("COOKIE_SECURE", false),
            rate_limiter_enabled: parse_env_or("ENABLE_RATE_LIMITER", true),
        };

        let metrics_bind = match optional_env("METRICS_BIND") {
            Some(addr) => Some(addr.parse().map_err(|e| ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("{e}"),
            })?),
            None => None,
        };

        Ok(ServerConfig {
            bind,
            database,
            redis_url,
            jwt,
            password,
            email,
            http,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Errors
    ///
    /// * `ConfigError::Invalid` - First offending setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(
            self.jwt.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(invalid("JWT_ALGORITHM", "Must be an asymmetric algorithm"));
        }

        for (var, value) in [
            ("JWT_ACCESS_TOKEN_EXPIRE", self.jwt.access_token_expire_minutes),
            ("JWT_REFRESH_TOKEN_EXPIRE", self.jwt.refresh_token_expire_days),
            ("JWT_RESET_TOKEN_EXPIRE", self.jwt.reset_token_expire_minutes),
            ("EMAIL_CONFIRM_TOKEN_EXPIRE", self.email.confirm_token_expire_hours),
        ] {
            if value <= 0 {
                return Err(invalid(var, "Must be greater than 0"));
            }
        }

        for (var, path) in [
            ("JWT_PRIVATE_KEY_PATH", &self.jwt.private_key_path),
            ("JWT_PUBLIC_KEY_PATH", &self.jwt.public_key_path),
        ] {
            if !path.is_file() {
                return Err(invalid(
                    var,
                    &format!("Key file {} does not exist", path.display()),
                ));
            }
        }

        if self.password.hash_rounds == 0 {
            return Err(invalid("PASSWORD_HASH_ROUNDS", "Must be greater than 0"));
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(invalid(
                "DB_MAX_CONNECTIONS",
                &format!(
                    "Must be at least DB_MIN_CONNECTIONS ({})",
                    self.database.min_connections
                ),
            ));
        }

        if HeaderValue::from_str(&self.http.allowed_hosts).is_err() {
            return Err(invalid("ALLOWED_HOSTS", "Must be a valid origin"));
        }

        Ok(())
    }

    /// Token lifetimes derived from the JWT settings
    pub fn token_lifetimes(&self) -> TokenLifetimes {
        TokenLifetimes {
            access: chrono::Duration::minutes(self.jwt.access_token_expire_minutes),
            refresh: chrono::Duration::days(self.jwt.refresh_token_expire_days),
            reset: chrono::Duration::minutes(self.jwt.reset_token_expire_minutes),
        }
    }

    /// Workflow settings handed to the auth manager
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            email_confirmation_enabled: self.email.confirmation_enabled,
            confirm_token_expiry: chrono::Duration::hours(self.email.confirm_token_expire_hours),
            frontend_url: self.http.allowed_hosts.clone(),
        }
    }

    pub fn email_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.email.max_retries,
            base_delay: Duration::from_millis(self.email.retry_base_delay_ms),
        }
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn invalid(var: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}

/// Non-empty environment variable
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required_path(key: &str, hint: &str) -> Result<PathBuf, ConfigError> {
    optional_env(key)
        .map(PathBuf::from)
        .ok_or_else(|| ConfigError::MissingRequired {
            var: key.to_string(),
            hint: hint.to_string(),
        })
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse a variable whose bad value must not be silently replaced
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = optional_env(key).unwrap_or_else(|| default.to_string());
    raw.trim().parse().map_err(|e| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("{e}"),
    })
}
