use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use std::path::PathBuf;
use std::time::Duration;

use crate::version::VERSION;

/// Low-level retry policy applied by the transport.
///
/// Connection failures are retried for every method. Status codes and timeouts are only
/// retried for idempotent methods, so a POST reaches the server at most once.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportRetry {
    pub max_retries: u32,
    /// Delay unit for exponential backoff; the first retry is immediate
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: Duration::from_secs(8),
            max_backoff: Duration::from_secs(120),
        }
    }
}

impl TransportRetry {
    /// No transport retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn retries_status(&self, status: StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
    }

    /// Methods that may be resent after the server saw them
    pub fn retries_method(&self, method: &Method) -> bool {
        matches!(
            *method,
            Method::GET
                | Method::HEAD
                | Method::PUT
                | Method::DELETE
                | Method::OPTIONS
                | Method::TRACE
        )
    }

    /// Statuses whose `Retry-After` header replaces the backoff delay
    pub fn honours_retry_after(&self, status: StatusCode) -> bool {
        matches!(status.as_u16(), 413 | 429 | 503)
    }

    /// Delay before retry number `attempt + 1`: 0, then factor * 2^attempt, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let multiplier = 2_u32.saturating_pow(attempt);
        self.backoff_factor
            .checked_mul(multiplier)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    // Server
    pub host: String,
    pub port: u16,
    pub https: bool,

    // HTTP digest authentication (both or neither)
    pub digest_username: Option<String>,
    pub digest_password: Option<String>,

    // Credential persistence
    pub auth_file: Option<PathBuf>,

    // HTTP client
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub retry: TransportRetry,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "scoreganizer.net".to_string(),
            port: 443,
            https: true,
            digest_username: None,
            digest_password: None,
            auth_file: None,
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            retry: TransportRetry::default(),
            user_agent: format!("scoreganizer-client/{}", VERSION),
        }
    }
}

impl ClientConfig {
    /// Point the client at another server
    pub fn endpoint(mut self, host: impl Into<String>, port: u16, https: bool) -> Self {
        self.host = host.into();
        self.port = port;
        self.https = https;
        self
    }

    pub fn digest_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.digest_username = Some(username.into());
        self.digest_password = Some(password.into());
        self
    }

    pub fn auth_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_file = Some(path.into());
        self
    }

    pub fn retry(mut self, retry: TransportRetry) -> Self {
        self.retry = retry;
        self
    }

    /// `{scheme}://{host}:{port}/api/`
    pub fn base_url(&self) -> String {
        let proto = if self.https { "https" } else { "http" };
        format!("{}://{}:{}/api/", proto, self.host, self.port)
    }

    /// Load configuration from the environment (and `.env`), falling back to defaults
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = ClientConfig {
            host: env_var("SCOREGANIZER_HOST").unwrap_or(defaults.host),

            port: env_var("SCOREGANIZER_PORT")
                .map(|s| s.parse::<u16>().context("SCOREGANIZER_PORT must be a port number"))
                .transpose()?
                .unwrap_or(defaults.port),

            https: env_var("SCOREGANIZER_HTTPS")
                .map(|s| parse_bool(&s))
                .transpose()?
                .unwrap_or(defaults.https),

            digest_username: env_var("SCOREGANIZER_DIGEST_USERNAME"),
            digest_password: env_var("SCOREGANIZER_DIGEST_PASSWORD"),

            auth_file: env_var("SCOREGANIZER_AUTH_FILE").map(|s| expand_tilde(&s)),

            connect_timeout: defaults.connect_timeout,

            request_timeout: env_var("SCOREGANIZER_HTTP_TIMEOUT")
                .map(|s| {
                    s.parse::<u64>()
                        .map(Duration::from_secs)
                        .context("SCOREGANIZER_HTTP_TIMEOUT must be a number of seconds")
                })
                .transpose()?
                .unwrap_or(defaults.request_timeout),

            retry: TransportRetry {
                max_retries: env_var("SCOREGANIZER_HTTP_MAX_RETRIES")
                    .map(|s| {
                        s.parse::<u32>()
                            .context("SCOREGANIZER_HTTP_MAX_RETRIES must be a number")
                    })
                    .transpose()?
                    .unwrap_or(defaults.retry.max_retries),
                ..defaults.retry
            },

            user_agent: defaults.user_agent,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            anyhow::bail!("Scoreganizer host must not be empty");
        }
        if self.port == 0 {
            anyhow::bail!("Scoreganizer port must not be 0");
        }
        if self.digest_username.is_some() != self.digest_password.is_some() {
            anyhow::bail!("Digest authentication needs both a username and a password");
        }
        Ok(())
    }
}

/// Default location of the credential file: `<config dir>/scoreganizer/auth.txt`
pub fn default_auth_file() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("scoreganizer").join("auth.txt"))
}

/// Non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Invalid boolean value: {}", other),
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
