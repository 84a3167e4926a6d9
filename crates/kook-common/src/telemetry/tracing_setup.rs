//! Log output for client applications
//!
//! The client crates log under the `kook_*` targets. Socket and HTTP
//! libraries underneath are capped at `warn` unless `RUST_LOG` says
//! otherwise.

use std::env;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Third-party targets that are noisy at `debug` and below
const QUIET_TARGETS: &[&str] = &["tungstenite", "tokio_tungstenite", "hyper", "hyper_util", "reqwest", "rustls"];

/// Target that carries one `trace` event per gateway frame
const FRAME_TARGET: &str = "kook_gateway::session";

#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for the client crates
    pub level: Level,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Log every gateway frame at `trace`
    pub frames: bool,
    /// Log span open/close
    pub spans: bool,
    /// Attach source file and line
    pub source_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            frames: false,
            spans: false,
            source_location: false,
        }
    }
}

impl TracingConfig {
    /// Verbose local output
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            spans: true,
            source_location: true,
            ..Self::default()
        }
    }

    /// JSON lines for log shippers
    pub fn production() -> Self {
        Self {
            json: true,
            ..Self::default()
        }
    }

    /// `KOOK_LOG_FORMAT=json` selects JSON, `KOOK_LOG_FRAMES=true` enables frame logs
    pub fn from_env() -> Self {
        let mut config = match env::var("KOOK_LOG_FORMAT").as_deref() {
            Ok("json") => Self::production(),
            Ok("dev" | "development") => Self::development(),
            _ => Self::default(),
        };
        config.frames = env::var("KOOK_LOG_FRAMES").is_ok_and(|v| v == "true" || v == "1");
        config
    }

    /// Filter used when `RUST_LOG` is unset
    pub fn directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        let mut directives = vec![level.clone()];
        directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
        if self.frames {
            directives.push(format!("{FRAME_TARGET}=trace"));
        }
        directives.join(",")
    }

    fn span_events(&self) -> FmtSpan {
        if self.spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the default subscriber.
///
/// # Panics
/// Panics if a global subscriber is already set.
pub fn init_tracing() {
    init_tracing_with_config(TracingConfig::from_env());
}

/// # Panics
/// Panics if a global subscriber is already set.
pub fn init_tracing_with_config(config: TracingConfig) {
    if let Err(e) = try_init_tracing_with_config(config) {
        panic!("{e}");
    }
}

pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::from_env())
}

/// Install a subscriber built from `config`; `RUST_LOG` wins over its level.
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.directives()))
        .map_err(|e| TracingError::Filter(e.to_string()))?;

    let json = config.json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(config.spans)
            .with_file(config.source_location)
            .with_line_number(config.source_location)
            .with_span_events(config.span_events())
    });
    let text = (!config.json).then(|| {
        fmt::layer()
            .with_file(config.source_location)
            .with_line_number(config.source_location)
            .with_span_events(config.span_events())
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(text)
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,

    #[error("Invalid log filter: {0}")]
    Filter(String),
}
