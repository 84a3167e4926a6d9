//! HTTP transport seam

mod http;
mod response;

pub use http::HttpTransport;
pub use response::RestResponse;

use async_trait::async_trait;

use crate::error::RestError;
use crate::queue::RestRequest;

/// Executes one request attempt.
///
/// Implementations report connection-level failures as
/// [`RestError::Transport`]; any response that arrived, whatever its status,
/// is returned as `Ok` so the dispatcher can read its rate-limit headers.
#[async_trait]
pub trait RestTransport: Send + Sync {
    async fn execute(&self, request: &RestRequest) -> Result<RestResponse, RestError>;
}
