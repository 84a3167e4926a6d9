//! Request description and per-call options

use kook_core::RetryMode;
use reqwest::Method;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::bucket::{BucketKey, RateLimitInfo};

/// Invoked (off the dispatch path) whenever a call is throttled
pub type RateLimitCallback = Arc<dyn Fn(RateLimitInfo) + Send + Sync>;

/// One API call
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
}

impl RestRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, endpoint).with_body(body)
    }

    /// Bucket this request falls under when the caller gives none
    pub fn default_bucket(&self) -> BucketKey {
        BucketKey::route(&self.method, &self.endpoint)
    }
}

/// Per-call overrides; unset fields fall back to the queue settings
#[derive(Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub retry_mode: Option<RetryMode>,
    pub bucket: Option<BucketKey>,
    pub rate_limit_callback: Option<RateLimitCallback>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn retry_mode(mut self, mode: RetryMode) -> Self {
        self.retry_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn bucket(mut self, bucket: BucketKey) -> Self {
        self.bucket = Some(bucket);
        self
    }

    #[must_use]
    pub fn on_rate_limit<F>(mut self, callback: F) -> Self
    where
        F: Fn(RateLimitInfo) + Send + Sync + 'static,
    {
        self.rate_limit_callback = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("timeout", &self.timeout)
            .field("retry_mode", &self.retry_mode)
            .field("bucket", &self.bucket)
            .field("rate_limit_callback", &self.rate_limit_callback.is_some())
            .finish()
    }
}
