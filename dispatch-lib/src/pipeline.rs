//! A fixed pool of workers executing submitted requests.
//!
//! The [`Pipeline`] owns one shared queue and `concurrency` workers draining
//! it. Every submitted request is executed exactly once and its callback is
//! invoked exactly once, from a worker.
//!
//! Lifecycle:
//!
//! 1. Configure the pipeline with its setters. Settings are frozen once the
//!    workers have been launched; later calls to a setter are ignored.
//! 2. Submit requests. The first submission (or an explicit
//!    [`Pipeline::start`]) launches the workers. A submission only returns
//!    once a worker has taken the request, so submitters cannot run ahead of
//!    the pool.
//! 3. [`Pipeline::close`] the queue. Workers finish the remaining requests
//!    and exit.
//! 4. [`Pipeline::wait`] until every worker has exited.
//!
//! There is no cancellation: a request runs until the transport returns,
//! bounded only by the transport's own timeout.
#![allow(clippy::module_name_repetitions)]
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_channel::{Receiver, Sender, bounded};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::{IntoUrl, Method, Request};

use crate::client::ClientBuilder;
use crate::ratelimit::RateLimiter;
use crate::transport::Transport;
use crate::types::{Callback, WorkItem};
use crate::waiter::WaitGroup;
use crate::worker::Worker;
use crate::{ErrorKind, Result};

/// Default number of workers, 20.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Resolves once every worker has exited. Cloned by each caller of
/// [`Pipeline::wait`].
type Barrier = Shared<BoxFuture<'static, ()>>;

/// Configuration that is frozen once the workers are launched
#[derive(Debug)]
struct Settings {
    concurrency: usize,
    transport: Arc<dyn Transport>,
    running: bool,
}

/// Executes submitted requests on a fixed number of concurrent workers,
/// optionally rate limited per host.
///
/// ```no_run
/// use dispatch_lib::{Pipeline, Result, callback};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let pipeline = Pipeline::new(4)?;
///     pipeline.set_rate_limit(Duration::from_millis(500));
///
///     for url in ["https://example.com/a", "https://example.com/b"] {
///         pipeline
///             .get(url, callback(|request, result| async move {
///                 match result {
///                     Ok(response) => println!("[{}] {}", response.status(), request.url()),
///                     Err(e) => eprintln!("[ERROR] {} | {e}", request.url()),
///                 }
///             }))
///             .await?;
///     }
///
///     pipeline.close();
///     pipeline.wait().await;
///     Ok(())
/// }
/// ```
pub struct Pipeline {
    settings: Mutex<Settings>,
    limiter: Arc<RateLimiter>,
    sender: Sender<WorkItem>,
    /// Handed to the workers on start. Afterwards only workers hold
    /// receivers, so the queue closes if all of them are gone.
    receiver: Mutex<Option<Receiver<WorkItem>>>,
    barrier: Mutex<Option<Barrier>>,
}

impl Pipeline {
    /// Create a pipeline with `concurrency` workers and the default
    /// transport, see [`ClientBuilder`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the default client cannot be built.
    pub fn new(concurrency: usize) -> Result<Self> {
        let client = ClientBuilder::default().client()?;
        Ok(Self::with_transport(concurrency, client))
    }

    /// Create a pipeline with `concurrency` workers executing requests
    /// through `transport`
    #[must_use]
    pub fn with_transport<T: Transport + 'static>(concurrency: usize, transport: T) -> Self {
        // The queue holds at most one item, and a submission is only complete
        // once a worker has accepted its item.
        let (sender, receiver) = bounded(1);
        Self {
            settings: Mutex::new(Settings {
                concurrency,
                transport: Arc::new(transport),
                running: false,
            }),
            limiter: Arc::new(RateLimiter::default()),
            sender,
            receiver: Mutex::new(Some(receiver)),
            barrier: Mutex::new(None),
        }
    }

    /// Set the number of workers. Ignored once the pipeline is running.
    pub fn set_concurrency(&self, concurrency: usize) {
        let mut settings = self.settings();
        if settings.running {
            log::debug!("Ignoring concurrency change to {concurrency}: pipeline is running");
            return;
        }
        settings.concurrency = concurrency;
    }

    /// Replace the transport. Ignored once the pipeline is running.
    pub fn set_transport<T: Transport + 'static>(&self, transport: T) {
        let mut settings = self.settings();
        if settings.running {
            log::debug!("Ignoring transport change: pipeline is running");
            return;
        }
        settings.transport = Arc::new(transport);
    }

    /// Set the minimum delay between two requests to the same host.
    /// A zero delay disables rate limiting. Ignored once the pipeline is running.
    pub fn set_rate_limit(&self, delay: Duration) {
        let settings = self.settings();
        if settings.running {
            log::debug!(
                "Ignoring rate limit change to {}ms: pipeline is running",
                delay.as_millis()
            );
            return;
        }
        self.limiter.set_delay(delay);
    }

    /// Returns `true` once the workers have been launched
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.settings().running
    }

    /// Returns `true` if requests are rate limited per host
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.limiter.is_enabled()
    }

    /// The configured number of workers
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.settings().concurrency
    }

    /// The rate limiter the workers consult, e.g. to read its statistics.
    /// It is the same limiter for the whole lifetime of the pipeline.
    #[must_use]
    pub fn rate_limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Launch the workers. Does nothing if they are already running.
    ///
    /// A concurrency of zero is treated as one.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn start(&self) {
        let mut settings = self.settings();
        if settings.running {
            return;
        }
        settings.running = true;

        if settings.concurrency == 0 {
            log::warn!("Concurrency of 0 requested, starting a single worker instead");
            settings.concurrency = 1;
        }

        let limiter = self
            .limiter
            .is_enabled()
            .then(|| Arc::clone(&self.limiter));
        log::debug!(
            "Starting {} workers (rate limit: {}ms per host)",
            settings.concurrency,
            self.limiter.delay().as_millis()
        );

        let Some(receiver) = lock(&self.receiver).take() else {
            return;
        };
        let (waiter, guard) = WaitGroup::new();
        for id in 0..settings.concurrency {
            let worker = Worker::new(
                id,
                receiver.clone(),
                Arc::clone(&settings.transport),
                limiter.clone(),
                guard.clone(),
            );
            tokio::spawn(worker.listen());
        }
        *lock(&self.barrier) = Some(waiter.wait().boxed().shared());
    }

    /// Submit `request` and the `callback` to invoke with its result.
    ///
    /// Starts the workers if needed, then waits until one of them has taken
    /// the request.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::PipelineClosed`] if the pipeline has been closed.
    /// The callback is dropped without being called in that case.
    pub async fn submit(&self, request: Request, callback: Callback) -> Result<()> {
        self.start();

        let (item, on_accept) = WorkItem::new(request, callback);
        self.sender
            .send(item)
            .await
            .map_err(|_| ErrorKind::PipelineClosed)?;

        // Dropped unaccepted only if the item was still queued when the
        // last receiver went away
        on_accept.await.map_err(|_| ErrorKind::PipelineClosed)
    }

    /// Submit a request with the given method, URL and optional body.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::BuildRequest`] if `url` is not a valid URL; the
    /// callback is never invoked in that case. See [`Pipeline::submit`] for
    /// the other errors.
    pub async fn request<U: IntoUrl>(
        &self,
        method: Method,
        url: U,
        body: Option<reqwest::Body>,
        callback: Callback,
    ) -> Result<()> {
        let mut request = Request::new(method, url.into_url().map_err(ErrorKind::BuildRequest)?);
        *request.body_mut() = body;
        self.submit(request, callback).await
    }

    /// Submit a `GET` request to `url`.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::request`].
    pub async fn get<U: IntoUrl>(&self, url: U, callback: Callback) -> Result<()> {
        self.request(Method::GET, url, None, callback).await
    }

    /// Submit a `POST` request with `body` to `url`.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::request`].
    pub async fn post<U: IntoUrl, B: Into<reqwest::Body>>(
        &self,
        url: U,
        body: B,
        callback: Callback,
    ) -> Result<()> {
        self.request(Method::POST, url, Some(body.into()), callback)
            .await
    }

    /// Close the queue. Workers process the requests that were already
    /// submitted and then exit.
    ///
    /// Launches the workers first if they never ran, so that
    /// [`Pipeline::wait`] observes them exit.
    ///
    /// # Panics
    ///
    /// Panics if the workers have to be launched outside of a tokio runtime.
    pub fn close(&self) {
        self.start();
        if !self.sender.close() {
            log::warn!("Pipeline was already closed");
        }
    }

    /// Returns `true` once [`Pipeline::close`] has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Wait until every worker has exited.
    ///
    /// Only returns after [`Pipeline::close`]; called on an open pipeline it
    /// waits for more requests forever. Returns immediately if the pipeline
    /// never started. Any number of callers may wait, concurrently or one
    /// after the other, and dropping a pending `wait` does not affect others.
    pub async fn wait(&self) {
        let barrier = lock(&self.barrier).clone();
        if let Some(barrier) = barrier {
            barrier.await;
            log::debug!("All workers have exited");
        }
    }

    fn settings(&self) -> MutexGuard<'_, Settings> {
        lock(&self.settings)
    }
}

// State behind these locks stays consistent even if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", &*self.settings())
            .field("limiter", &self.limiter)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    /// A pipeline with [`DEFAULT_CONCURRENCY`] workers and a default
    /// [`reqwest::Client`] transport.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized, see
    /// [`reqwest::Client::new`].
    fn default() -> Self {
        Self::with_transport(DEFAULT_CONCURRENCY, reqwest::Client::new())
    }
}
