//! Rate-limit buckets and the headers that drive them

mod info;
mod key;
mod state;

pub use info::RateLimitInfo;
pub use key::BucketKey;
pub use state::RateLimitBucket;
