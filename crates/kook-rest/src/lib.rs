//! # kook-rest
//!
//! Outbound side of the client: every call to the request-response API goes
//! through a [`RequestQueue`], which serializes requests per rate-limit
//! bucket, honors server cooldowns, and applies the per-request retry policy.

pub mod bucket;
pub mod error;
pub mod queue;
pub mod transport;

pub use bucket::{BucketKey, RateLimitBucket, RateLimitInfo};
pub use error::{RestError, RestResult};
pub use queue::{
    QueueSettings, RateLimitCallback, RateLimitObserver, RequestOptions, RequestQueue,
    ResponseHandle, RestRequest,
};
pub use transport::{HttpTransport, RestResponse, RestTransport};

/// Re-exported so callers can build requests without a direct `reqwest` dependency
pub use reqwest::Method;
