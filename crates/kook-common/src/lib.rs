//! # kook-common
//!
//! Shared utilities including configuration, the client-facing error type, and telemetry.

pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AuthConfig, CacheConfig, ClientConfig, ConfigError, GatewayConfig, ReconnectConfig, RestConfig,
};
pub use error::{ClientError, ClientResult};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
