//! Request dispatcher
//!
//! One FIFO per bucket, drained by a worker task that exists only while the
//! bucket has pending work. Workers for different buckets run concurrently;
//! within a bucket exactly one request is charged and executing at a time.

use dashmap::DashMap;
use kook_common::ClientConfig;
use kook_core::RetryMode;
use parking_lot::{Mutex, RwLock};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::handle::{Responder, ResponseHandle};
use super::request::{RateLimitCallback, RequestOptions, RestRequest};
use crate::bucket::{BucketKey, RateLimitBucket, RateLimitInfo};
use crate::error::{RestError, RestResult};
use crate::transport::{HttpTransport, RestResponse, RestTransport};

/// Observer notified of every throttling signal, in dispatch order
pub type RateLimitObserver = Arc<dyn Fn(&RateLimitInfo) + Send + Sync>;

/// Used when a 429 carries neither `Retry-After` nor a reset time
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(1);

/// Dispatcher-wide defaults
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub default_timeout: Option<Duration>,
    pub default_retry_mode: RetryMode,
    pub max_retries: u32,
    /// Frames allowed per window on the gateway-send bucket
    pub gateway_limit: u32,
    pub gateway_window: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            default_timeout: Some(Duration::from_secs(15)),
            default_retry_mode: RetryMode::Always,
            max_retries: 5,
            gateway_limit: 120,
            gateway_window: Duration::from_secs(60),
        }
    }
}

impl QueueSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            default_timeout: Some(config.rest.default_timeout()),
            default_retry_mode: config.rest.default_retry_mode,
            max_retries: config.rest.max_retries,
            gateway_limit: config.gateway.send_limit,
            gateway_window: config.gateway.send_window(),
        }
    }
}

struct QueuedRequest {
    /// `None` reserves bucket capacity without performing a call
    request: Option<RestRequest>,
    deadline: Option<Instant>,
    retry_mode: RetryMode,
    retries: u32,
    callback: Option<RateLimitCallback>,
    responder: Responder,
}

impl QueuedRequest {
    fn finish(self, result: RestResult<RestResponse>) {
        // Receiver may have been dropped; nothing to report then.
        let _ = self.responder.send(result);
    }
}

struct BucketState {
    bucket: RateLimitBucket,
    pending: VecDeque<QueuedRequest>,
    worker_active: bool,
}

struct BucketQueue {
    key: BucketKey,
    state: Mutex<BucketState>,
}

impl BucketQueue {
    fn new(key: BucketKey, bucket: RateLimitBucket) -> Self {
        Self {
            key,
            state: Mutex::new(BucketState {
                bucket,
                pending: VecDeque::new(),
                worker_active: false,
            }),
        }
    }

    fn push_front(&self, item: QueuedRequest) {
        self.state.lock().pending.push_front(item);
    }
}

struct Shared {
    transport: Arc<dyn RestTransport>,
    settings: QueueSettings,
    buckets: DashMap<BucketKey, Arc<BucketQueue>>,
    global_reset: Mutex<Option<Instant>>,
    observers: RwLock<Vec<RateLimitObserver>>,
    shutdown: watch::Sender<bool>,
}

impl Shared {
    fn bucket_queue(&self, key: &BucketKey) -> Arc<BucketQueue> {
        self.buckets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(BucketQueue::new(key.clone(), RateLimitBucket::unbounded())))
            .clone()
    }

    fn global_blocked_until(&self, now: Instant) -> Option<Instant> {
        let mut global = self.global_reset.lock();
        match *global {
            Some(reset) if reset > now => Some(reset),
            Some(_) => {
                *global = None;
                None
            }
            None => None,
        }
    }

    fn pause_global(&self, until: Instant) {
        let mut global = self.global_reset.lock();
        if global.map_or(true, |current| current < until) {
            *global = Some(until);
        }
    }

    fn notify_rate_limit(&self, info: &RateLimitInfo, callback: Option<&RateLimitCallback>) {
        for observer in self.observers.read().iter() {
            observer(info);
        }
        if let Some(callback) = callback {
            let callback = Arc::clone(callback);
            let info = info.clone();
            tokio::spawn(async move { callback(info) });
        }
    }
}

/// Rate-limited dispatcher for API calls
#[derive(Clone)]
pub struct RequestQueue {
    shared: Arc<Shared>,
}

impl RequestQueue {
    /// Create a dispatcher over any transport
    pub fn new(transport: Arc<dyn RestTransport>, settings: QueueSettings) -> Self {
        let (shutdown, _) = watch::channel(false);
        let buckets = DashMap::new();
        buckets.insert(
            BucketKey::Gateway,
            Arc::new(BucketQueue::new(
                BucketKey::Gateway,
                RateLimitBucket::fixed_window(settings.gateway_limit, settings.gateway_window),
            )),
        );

        Self {
            shared: Arc::new(Shared {
                transport,
                settings,
                buckets,
                global_reset: Mutex::new(None),
                observers: RwLock::new(Vec::new()),
                shutdown,
            }),
        }
    }

    /// Create a dispatcher backed by the HTTP transport
    pub fn from_config(config: &ClientConfig) -> RestResult<Self> {
        let transport = HttpTransport::new(&config.auth, &config.rest)?;
        Ok(Self::new(Arc::new(transport), QueueSettings::from_config(config)))
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.shared.settings
    }

    /// Register (or reset) a fixed-window client bucket
    pub fn register_client_bucket(
        &self,
        name: impl Into<String>,
        limit: u32,
        window: Duration,
    ) -> BucketKey {
        let key = BucketKey::client(name);
        let queue = self.shared.bucket_queue(&key);
        queue.state.lock().bucket = RateLimitBucket::fixed_window(limit, window);
        tracing::debug!(bucket = %key, limit, window_ms = window.as_millis() as u64, "Client bucket registered");
        key
    }

    /// Observe every throttling signal the dispatcher sees
    pub fn on_rate_limit<F>(&self, observer: F)
    where
        F: Fn(&RateLimitInfo) + Send + Sync + 'static,
    {
        self.shared.observers.write().push(Arc::new(observer));
    }

    /// Queue a request under `bucket`
    pub fn enqueue(
        &self,
        bucket: BucketKey,
        request: RestRequest,
        options: RequestOptions,
    ) -> ResponseHandle {
        let timeout = options.timeout.or(self.shared.settings.default_timeout);
        self.push(bucket, Some(request), options, timeout)
    }

    /// Queue a call, deriving the bucket from method and target unless overridden
    pub fn send(
        &self,
        method: Method,
        target: impl Into<String>,
        body: Option<Value>,
        options: RequestOptions,
    ) -> ResponseHandle {
        let request = RestRequest {
            method,
            endpoint: target.into(),
            body,
        };
        let bucket = options
            .bucket
            .clone()
            .unwrap_or_else(|| request.default_bucket());
        self.enqueue(bucket, request, options)
    }

    /// Send a call and decode the `data` field of a successful response
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        target: impl Into<String>,
        body: Option<Value>,
        options: RequestOptions,
    ) -> RestResult<T> {
        self.send(method, target, body, options).await?.data()
    }

    /// Wait for one unit of capacity on `bucket` without making a call.
    ///
    /// Without a `timeout` the permit waits for as many resets as it takes;
    /// the REST default timeout does not apply.
    pub async fn acquire(&self, bucket: BucketKey, timeout: Option<Duration>) -> RestResult<()> {
        let options = RequestOptions::new().retry_mode(RetryMode::Never);
        self.push(bucket, None, options, timeout).await.map(|_| ())
    }

    /// Reserve a slot on the gateway-send bucket, waiting out its window
    pub async fn acquire_gateway_slot(&self) -> RestResult<()> {
        self.acquire(BucketKey::Gateway, None).await
    }

    /// Snapshot of a bucket's accounting
    pub fn bucket(&self, key: &BucketKey) -> Option<RateLimitBucket> {
        self.shared
            .buckets
            .get(key)
            .map(|queue| queue.state.lock().bucket.clone())
    }

    /// Requests waiting (not executing) in a bucket
    pub fn pending(&self, key: &BucketKey) -> usize {
        self.shared
            .buckets
            .get(key)
            .map_or(0, |queue| queue.state.lock().pending.len())
    }

    /// End of the current client-wide pause, if any
    pub fn global_reset(&self) -> Option<Instant> {
        self.shared.global_blocked_until(Instant::now())
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shared.shutdown.borrow()
    }

    /// Stop dispatching: pending and in-flight requests fail with
    /// [`RestError::Cancelled`], later enqueues fail immediately.
    pub fn shutdown(&self) {
        if self.shared.shutdown.send_replace(true) {
            return;
        }
        tracing::info!("Request queue shutting down");

        let mut cancelled = 0usize;
        for entry in self.shared.buckets.iter() {
            let drained = std::mem::take(&mut entry.value().state.lock().pending);
            cancelled += drained.len();
            for item in drained {
                item.finish(Err(RestError::Cancelled));
            }
        }
        tracing::debug!(cancelled, "Pending requests cancelled");
    }

    fn push(
        &self,
        bucket: BucketKey,
        request: Option<RestRequest>,
        options: RequestOptions,
        timeout: Option<Duration>,
    ) -> ResponseHandle {
        if self.is_shut_down() {
            return ResponseHandle::failed(RestError::Cancelled);
        }

        let settings = &self.shared.settings;
        let (responder, handle) = ResponseHandle::channel();
        let item = QueuedRequest {
            request,
            deadline: timeout.map(|timeout| Instant::now() + timeout),
            retry_mode: options.retry_mode.unwrap_or(settings.default_retry_mode),
            retries: 0,
            callback: options.rate_limit_callback,
            responder,
        };

        let queue = self.shared.bucket_queue(&bucket);
        let spawn_worker = {
            let mut state = queue.state.lock();
            state.pending.push_back(item);
            !std::mem::replace(&mut state.worker_active, true)
        };
        if spawn_worker {
            tokio::spawn(run_bucket(Arc::clone(&self.shared), queue));
        }
        handle
    }
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestQueue")
            .field("settings", &self.shared.settings)
            .field("buckets", &self.shared.buckets.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Drain one bucket until it is empty or the dispatcher shuts down
async fn run_bucket(shared: Arc<Shared>, queue: Arc<BucketQueue>) {
    let mut shutdown = shared.shutdown.subscribe();
    tracing::trace!(bucket = %queue.key, "Bucket worker started");

    loop {
        if *shutdown.borrow_and_update() {
            let drained = {
                let mut state = queue.state.lock();
                state.worker_active = false;
                std::mem::take(&mut state.pending)
            };
            for item in drained {
                item.finish(Err(RestError::Cancelled));
            }
            return;
        }

        let next = {
            let mut state = queue.state.lock();
            let next = state.pending.pop_front();
            if next.is_none() {
                state.worker_active = false;
            }
            next
        };
        let Some(mut item) = next else {
            tracing::trace!(bucket = %queue.key, "Bucket worker idle");
            return;
        };

        // Caller dropped the handle before execution
        if item.responder.is_closed() {
            continue;
        }

        let now = Instant::now();
        if item.deadline.is_some_and(|deadline| deadline <= now) {
            item.finish(Err(RestError::Timeout));
            continue;
        }

        // Global pause first, then this bucket's own allowance
        let blocked = shared
            .global_blocked_until(now)
            .or_else(|| queue.state.lock().bucket.blocked_until(now));
        if let Some(until) = blocked {
            if item.deadline.is_some_and(|deadline| deadline < until) {
                tracing::debug!(
                    bucket = %queue.key,
                    wait_ms = (until - now).as_millis() as u64,
                    "Deadline falls before bucket reset"
                );
                item.finish(Err(RestError::Timeout));
                continue;
            }

            tracing::debug!(
                bucket = %queue.key,
                wait_ms = (until - now).as_millis() as u64,
                "Bucket exhausted, waiting for reset"
            );
            if !wait_until(until, &mut shutdown).await {
                item.finish(Err(RestError::Cancelled));
                continue;
            }
            queue.push_front(item);
            continue;
        }

        queue.state.lock().bucket.consume(now);

        let request = item.request.clone();
        let Some(request) = request else {
            item.finish(Ok(RestResponse::permit()));
            continue;
        };

        let attempt = tokio::select! {
            biased;
            _ = shutdown.changed() => None,
            result = execute(shared.transport.as_ref(), &request, item.deadline) => Some(result),
        };
        let Some(result) = attempt else {
            item.finish(Err(RestError::Cancelled));
            continue;
        };

        let max_retries = shared.settings.max_retries;
        match result {
            Err(RestError::Timeout) => {
                tracing::debug!(bucket = %queue.key, endpoint = %request.endpoint, "Request deadline exceeded");
                item.finish(Err(RestError::Timeout));
            }
            Err(err) if err.is_timeout_class() && item.retry_mode.retries_timeouts() => {
                retry_or_exhaust(&queue, item, err, max_retries);
            }
            Err(err) => item.finish(Err(err)),
            Ok(response) => {
                let now = Instant::now();
                let info = RateLimitInfo::from_headers(&queue.key, &response.headers);
                if info.has_limits() {
                    queue.state.lock().bucket.update(&info, now);
                }

                if response.is_rate_limited() {
                    let wait = info.cooldown().unwrap_or(DEFAULT_COOLDOWN);
                    queue.state.lock().bucket.cooldown(wait, now);
                    if info.global {
                        shared.pause_global(now + wait);
                    }
                    tracing::warn!(
                        bucket = %queue.key,
                        endpoint = %request.endpoint,
                        retry_after_ms = wait.as_millis() as u64,
                        global = info.global,
                        "Rate limited"
                    );
                    shared.notify_rate_limit(&info, item.callback.as_ref());

                    let err = RestError::RateLimited {
                        bucket: queue.key.to_string(),
                        retry_after: wait,
                    };
                    if item.retry_mode.retries_rate_limits() {
                        retry_or_exhaust(&queue, item, err, max_retries);
                    } else {
                        item.finish(Err(err));
                    }
                    continue;
                }

                match response.error_for_status() {
                    Ok(response) => item.finish(Ok(response)),
                    Err(err) if err.is_timeout_class() && item.retry_mode.retries_timeouts() => {
                        retry_or_exhaust(&queue, item, err, max_retries);
                    }
                    Err(err) => item.finish(Err(err)),
                }
            }
        }
    }
}

async fn execute(
    transport: &dyn RestTransport,
    request: &RestRequest,
    deadline: Option<Instant>,
) -> RestResult<RestResponse> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, transport.execute(request))
            .await
            .map_err(|_| RestError::Timeout)?,
        None => transport.execute(request).await,
    }
}

/// Put the request back at the front of its bucket, or fail it when the
/// retry budget is spent
fn retry_or_exhaust(queue: &BucketQueue, mut item: QueuedRequest, err: RestError, max_retries: u32) {
    if item.retries >= max_retries {
        tracing::debug!(bucket = %queue.key, attempts = item.retries + 1, error = %err, "Retries exhausted");
        let attempts = item.retries + 1;
        item.finish(Err(RestError::RetriesExhausted {
            attempts,
            last: Box::new(err),
        }));
        return;
    }
    item.retries += 1;
    tracing::debug!(bucket = %queue.key, retry = item.retries, error = %err, "Retrying request");
    queue.push_front(item);
}

/// Sleep until `until`; `false` if the dispatcher shut down first
async fn wait_until(until: Instant, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep_until(until) => true,
        _ = shutdown.changed() => false,
    }
}
