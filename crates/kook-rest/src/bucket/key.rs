//! Bucket identity

use reqwest::Method;
use std::fmt;

/// Scope under which call-rate accounting is tracked
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BucketKey {
    /// A server-side endpoint scope
    Route(String),
    /// A client-side scope with a locally configured window
    Client(String),
    /// Application frames sent over the event stream
    Gateway,
}

impl BucketKey {
    /// Default bucket for a call: method plus path, query string stripped
    pub fn route(method: &Method, target: &str) -> Self {
        let path = target.split('?').next().unwrap_or(target).trim_matches('/');
        Self::Route(format!("{method} {path}"))
    }

    pub fn client(name: impl Into<String>) -> Self {
        Self::Client(name.into())
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Route(route) => f.write_str(route),
            Self::Client(name) => write!(f, "client:{name}"),
            Self::Gateway => f.write_str("gateway"),
        }
    }
}
