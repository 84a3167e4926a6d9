//! Result handle returned by the dispatcher

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::RestError;
use crate::transport::RestResponse;

pub(crate) type Responder = oneshot::Sender<Result<RestResponse, RestError>>;

/// Resolves once the queued request reaches a terminal outcome.
///
/// Dropping the handle abandons the request; it is skipped if it has not
/// started executing yet.
#[derive(Debug)]
pub struct ResponseHandle {
    rx: oneshot::Receiver<Result<RestResponse, RestError>>,
}

impl ResponseHandle {
    pub(crate) fn channel() -> (Responder, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Handle that is already resolved with an error
    pub(crate) fn failed(err: RestError) -> Self {
        let (tx, handle) = Self::channel();
        let _ = tx.send(Err(err));
        handle
    }
}

impl Future for ResponseHandle {
    type Output = Result<RestResponse, RestError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(RestError::Cancelled)))
    }
}
