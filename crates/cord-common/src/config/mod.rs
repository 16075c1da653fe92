//! Configuration structs

mod app_config;

pub use app_config::{
    AppSettings, ClientConfig, Compression, ConfigError, Encoding, Environment, GatewayConfig,
    ShardConfig,
};
