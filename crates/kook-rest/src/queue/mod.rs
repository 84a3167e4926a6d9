//! Per-bucket request serialization

mod dispatcher;
mod handle;
mod request;

pub use dispatcher::{QueueSettings, RateLimitObserver, RequestQueue};
pub use handle::ResponseHandle;
pub use request::{RateLimitCallback, RequestOptions, RestRequest};
