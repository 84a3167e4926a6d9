//! Configuration structs

mod client_config;

pub use client_config::{
    AuthConfig, CacheConfig, ClientConfig, ConfigError, GatewayConfig, ReconnectConfig, RestConfig,
};
