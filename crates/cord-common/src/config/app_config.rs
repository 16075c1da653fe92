//! Client configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Main client configuration
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub gateway: GatewayConfig,
    pub shards: ShardConfig,
    /// Bot token sent in Identify and Resume
    pub token: String,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
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

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            other => Err(ConfigError::InvalidValue("APP_ENV", other.to_string())),
        }
    }
}

/// Payload encoding negotiated with the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Json,
    Etf,
}

impl Encoding {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Etf => "etf",
        }
    }
}

impl FromStr for Encoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "etf" => Ok(Self::Etf),
            other => Err(ConfigError::InvalidValue("GATEWAY_ENCODING", other.to_string())),
        }
    }
}

/// Transport compression negotiated with the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Compression {
    None,
    #[default]
    ZlibStream,
}

impl Compression {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ZlibStream => "zlib-stream",
        }
    }
}

impl FromStr for Compression {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "zlib-stream" => Ok(Self::ZlibStream),
            other => Err(ConfigError::InvalidValue("GATEWAY_COMPRESS", other.to_string())),
        }
    }
}

/// Gateway connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub url: String,
    #[serde(default = "default_version")]
    pub version: u8,
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default = "default_intents")]
    pub intents: u64,
    /// Capacity of the per-connection outbound frame queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl GatewayConfig {
    /// URL to open a fresh connection against
    #[must_use]
    pub fn connect_url(&self) -> String {
        self.connect_url_for(&self.url)
    }

    /// URL for `base` (e.g. a resume URL handed out in READY) with the
    /// negotiated query parameters
    #[must_use]
    pub fn connect_url_for(&self, base: &str) -> String {
        let mut url = format!(
            "{}/?v={}&encoding={}",
            base.trim_end_matches('/'),
            self.version,
            self.encoding.as_str()
        );
        if self.compression == Compression::ZlibStream {
            url.push_str("&compress=zlib-stream");
        }
        url
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            version: default_version(),
            encoding: Encoding::default(),
            compression: Compression::default(),
            intents: default_intents(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

/// Sharding configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ShardConfig {
    #[serde(default = "default_shard_count")]
    pub count: u32,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            count: default_shard_count(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "cord".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_gateway_url() -> String {
    "wss://gateway.discord.gg".to_string()
}

fn default_version() -> u8 {
    10
}

fn default_intents() -> u64 {
    513 // GUILDS | GUILD_MESSAGES
}

fn default_outbound_buffer() -> usize {
    100
}

fn default_shard_count() -> u32 {
    1
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_or<T: FromStr>(
    value: Option<String>,
    key: &'static str,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        None => Ok(default()),
    }
}

impl ClientConfig {
    /// Build a configuration with defaults for everything but the token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: default_env(),
            },
            gateway: GatewayConfig::default(),
            shards: ShardConfig::default(),
            token: token.into(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let env = match lookup("APP_ENV") {
            Some(raw) => raw.parse()?,
            None => default_env(),
        };
        let encoding = match lookup("GATEWAY_ENCODING") {
            Some(raw) => raw.parse()?,
            None => Encoding::default(),
        };
        let compression = match lookup("GATEWAY_COMPRESS") {
            Some(raw) => raw.parse()?,
            None => Compression::default(),
        };

        let shard_count = parse_or(lookup("SHARD_COUNT"), "SHARD_COUNT", default_shard_count)?;
        if shard_count == 0 {
            return Err(ConfigError::InvalidValue("SHARD_COUNT", "0".to_string()));
        }

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env,
            },
            gateway: GatewayConfig {
                url: lookup("GATEWAY_URL").unwrap_or_else(default_gateway_url),
                version: parse_or(lookup("GATEWAY_VERSION"), "GATEWAY_VERSION", default_version)?,
                encoding,
                compression,
                intents: parse_or(lookup("GATEWAY_INTENTS"), "GATEWAY_INTENTS", default_intents)?,
                outbound_buffer: parse_or(
                    lookup("OUTBOUND_BUFFER"),
                    "OUTBOUND_BUFFER",
                    default_outbound_buffer,
                )?,
            },
            shards: ShardConfig { count: shard_count },
            token: lookup("BOT_TOKEN")
                .filter(|t| !t.trim().is_empty())
                .ok_or(ConfigError::MissingVar("BOT_TOKEN"))?,
        })
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("app", &self.app)
            .field("gateway", &self.gateway)
            .field("shards", &self.shards)
            .field("token", &"<redacted>")
            .finish()
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
