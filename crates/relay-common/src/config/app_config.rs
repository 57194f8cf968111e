//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub server: ServerConfig,
    pub relay: RelayConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue("APP_ENV", other.to_string())),
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse the configured host and port into a socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.address()
            .parse()
            .map_err(|_| ConfigError::InvalidValue("HOST", self.host.clone()))
    }
}

/// Relay tuning knobs
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Depth of each connection's outbound queue
    pub outbound_buffer: usize,
    /// Seconds between keepalive pings (0 disables)
    pub ping_interval_secs: u64,
    /// Seconds without inbound traffic before a connection is dropped (0 disables)
    pub idle_timeout_secs: u64,
    /// Largest inbound frame accepted, in bytes
    pub max_message_bytes: usize,
}

impl RelayConfig {
    #[must_use]
    pub fn ping_interval(&self) -> Option<Duration> {
        let secs = self.ping_interval_secs;
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        let secs = self.idle_timeout_secs;
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_OUTBOUND_BUFFER",
                "0".to_string(),
            ));
        }
        if self.max_message_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_MAX_MESSAGE_BYTES",
                "0".to_string(),
            ));
        }
        if let (Some(ping), Some(idle)) = (self.ping_interval(), self.idle_timeout()) {
            if idle <= ping {
                return Err(ConfigError::InvalidValue(
                    "RELAY_IDLE_TIMEOUT_SECS",
                    format!(
                        "{} (must exceed RELAY_PING_INTERVAL_SECS={})",
                        self.idle_timeout_secs, self.ping_interval_secs
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
            ping_interval_secs: default_ping_interval_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "json-relay".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_max_message_bytes() -> usize {
    1024 * 1024 // 1 MiB
}

/// Read `key` and parse it, falling back to `default` only when unset
fn parse_or<T, F>(
    lookup: &F,
    key: &'static str,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        _ => Ok(default()),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value that cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: parse_or(&lookup, "APP_ENV", Environment::default)?,
            },
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(default_host),
                port: parse_or(&lookup, "PORT", default_port)?,
            },
            relay: RelayConfig {
                outbound_buffer: parse_or(
                    &lookup,
                    "RELAY_OUTBOUND_BUFFER",
                    default_outbound_buffer,
                )?,
                ping_interval_secs: parse_or(
                    &lookup,
                    "RELAY_PING_INTERVAL_SECS",
                    default_ping_interval_secs,
                )?,
                idle_timeout_secs: parse_or(
                    &lookup,
                    "RELAY_IDLE_TIMEOUT_SECS",
                    default_idle_timeout_secs,
                )?,
                max_message_bytes: parse_or(
                    &lookup,
                    "RELAY_MAX_MESSAGE_BYTES",
                    default_max_message_bytes,
                )?,
            },
        };

        config.relay.validate()?;
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: Environment::default(),
            },
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            relay: RelayConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
