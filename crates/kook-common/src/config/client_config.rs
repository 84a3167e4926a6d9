//! Client configuration structs
//!
//! Loads configuration from environment variables (with `.env` support) or
//! from any serde source.

use kook_core::{RetryMode, TokenType};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    pub auth: AuthConfig,
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Credentials
#[derive(Clone, Default, Deserialize)]
pub struct AuthConfig {
    pub token: String,
    #[serde(default)]
    pub token_type: TokenType,
}

impl AuthConfig {
    /// Full `Authorization` header value
    #[must_use]
    pub fn authorization(&self) -> String {
        self.token_type.authorization(&self.token)
    }
}

// Never print the token itself
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Request-response API settings
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default)]
    pub default_retry_mode: RetryMode,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl RestConfig {
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_timeout_ms: default_timeout_ms(),
            default_retry_mode: RetryMode::default(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

/// Event-stream connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Explicit gateway URL. When unset the URL is resolved through the REST API.
    #[serde(default)]
    pub url: Option<String>,
    /// Overrides the interval announced in the handshake
    #[serde(default)]
    pub heartbeat_interval_ms: Option<u64>,
    /// Defaults to the heartbeat interval
    #[serde(default)]
    pub heartbeat_ack_timeout_ms: Option<u64>,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default = "default_send_limit")]
    pub send_limit: u32,
    #[serde(default = "default_send_window_ms")]
    pub send_window_ms: u64,
}

impl GatewayConfig {
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    #[must_use]
    pub fn send_window(&self) -> Duration {
        Duration::from_millis(self.send_window_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            heartbeat_interval_ms: None,
            heartbeat_ack_timeout_ms: None,
            handshake_timeout_ms: default_handshake_timeout_ms(),
            reconnect: ReconnectConfig::default(),
            send_limit: default_send_limit(),
            send_window_ms: default_send_window_ms(),
        }
    }
}

/// Reconnect backoff settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter: default_jitter(),
        }
    }
}

/// Local cache settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Messages kept per channel; 0 disables message windows
    #[serde(default = "default_message_cache_size")]
    pub message_cache_size: usize,
    /// Bounded queue size per subscriber group
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            message_cache_size: default_message_cache_size(),
            event_buffer: default_event_buffer(),
        }
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://www.kookapp.cn/api/v3".to_string()
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_user_agent() -> String {
    concat!("kook-client/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_send_limit() -> u32 {
    120
}

fn default_send_window_ms() -> u64 {
    60_000
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_jitter() -> bool {
    true
}

fn default_message_cache_size() -> usize {
    100
}

fn default_event_buffer() -> usize {
    256
}

impl ClientConfig {
    /// Build a config with defaults and the given bot token
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            auth: AuthConfig {
                token: token.into(),
                token_type: TokenType::Bot,
            },
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `KOOK_TOKEN` is missing or a value fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// # Errors
    /// Returns an error if `KOOK_TOKEN` is missing or a value fails to parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("KOOK_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingVar("KOOK_TOKEN"))?;

        let token_type = match lookup("KOOK_TOKEN_TYPE") {
            Some(s) => match s.to_lowercase().as_str() {
                "bot" => TokenType::Bot,
                "bearer" => TokenType::Bearer,
                _ => return Err(ConfigError::InvalidValue("KOOK_TOKEN_TYPE", s)),
            },
            None => TokenType::default(),
        };

        let default_retry_mode = match lookup("KOOK_RETRY_MODE") {
            Some(s) => s
                .parse::<RetryMode>()
                .map_err(|_| ConfigError::InvalidValue("KOOK_RETRY_MODE", s))?,
            None => RetryMode::default(),
        };

        Ok(Self {
            auth: AuthConfig { token, token_type },
            rest: RestConfig {
                base_url: lookup("KOOK_API_URL").unwrap_or_else(default_base_url),
                default_timeout_ms: parse_var(&lookup, "KOOK_REQUEST_TIMEOUT_MS")?
                    .unwrap_or_else(default_timeout_ms),
                default_retry_mode,
                max_retries: parse_var(&lookup, "KOOK_MAX_RETRIES")?
                    .unwrap_or_else(default_max_retries),
                user_agent: default_user_agent(),
            },
            gateway: GatewayConfig {
                url: lookup("KOOK_GATEWAY_URL"),
                heartbeat_interval_ms: parse_var(&lookup, "KOOK_HEARTBEAT_INTERVAL_MS")?,
                heartbeat_ack_timeout_ms: parse_var(&lookup, "KOOK_HEARTBEAT_ACK_TIMEOUT_MS")?,
                handshake_timeout_ms: parse_var(&lookup, "KOOK_HANDSHAKE_TIMEOUT_MS")?
                    .unwrap_or_else(default_handshake_timeout_ms),
                reconnect: ReconnectConfig {
                    initial_delay_ms: parse_var(&lookup, "KOOK_RECONNECT_INITIAL_MS")?
                        .unwrap_or_else(default_initial_delay_ms),
                    max_delay_ms: parse_var(&lookup, "KOOK_RECONNECT_MAX_MS")?
                        .unwrap_or_else(default_max_delay_ms),
                    max_attempts: parse_var(&lookup, "KOOK_RECONNECT_MAX_ATTEMPTS")?
                        .unwrap_or_else(default_max_attempts),
                    jitter: parse_var(&lookup, "KOOK_RECONNECT_JITTER")?
                        .unwrap_or_else(default_jitter),
                },
                send_limit: default_send_limit(),
                send_window_ms: default_send_window_ms(),
            },
            cache: CacheConfig {
                message_cache_size: parse_var(&lookup, "KOOK_MESSAGE_CACHE_SIZE")?
                    .unwrap_or_else(default_message_cache_size),
                event_buffer: parse_var(&lookup, "KOOK_EVENT_BUFFER")?
                    .unwrap_or_else(default_event_buffer),
            },
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
