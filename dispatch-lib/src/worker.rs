use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_channel::Receiver;
use futures::FutureExt;
use reqwest::Request;

use crate::ErrorKind;
use crate::ratelimit::{HostKey, RateLimiter};
use crate::transport::Transport;
use crate::types::WorkItem;
use crate::waiter::WaitGuard;

/// A single executor of the pipeline.
///
/// Workers share one queue; every item is received by exactly one of them.
/// A worker exits once the queue is closed and empty, dropping its
/// [`WaitGuard`] on the way out.
#[derive(Debug)]
pub(crate) struct Worker {
    id: usize,
    requests: Receiver<WorkItem>,
    transport: Arc<dyn Transport>,
    limiter: Option<Arc<RateLimiter>>,
    _guard: WaitGuard,
}

impl Worker {
    pub(crate) fn new(
        id: usize,
        requests: Receiver<WorkItem>,
        transport: Arc<dyn Transport>,
        limiter: Option<Arc<RateLimiter>>,
        guard: WaitGuard,
    ) -> Self {
        Worker {
            id,
            requests,
            transport,
            limiter,
            _guard: guard,
        }
    }

    /// Process items until the queue is closed and drained
    pub(crate) async fn listen(self) {
        log::debug!("Worker {} started", self.id);

        while let Ok(item) = self.requests.recv().await {
            let (request, callback) = item.accept();

            if let Some(limiter) = &self.limiter {
                match HostKey::try_from(&request) {
                    Ok(host) => limiter.block(&host).await,
                    Err(e) => log::warn!(
                        "Not rate limiting request to {}: {e}",
                        request.url().as_str()
                    ),
                }
            }

            let original = replicate(&request);
            let transport = Arc::clone(&self.transport);
            let execution = AssertUnwindSafe(async move { transport.execute(request).await });
            let result = match execution.catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref()).to_string();
                    log::error!(
                        "Worker {}: transport panicked on {}: {message}",
                        self.id,
                        original.url().as_str()
                    );
                    Err(ErrorKind::TransportPanic(message))
                }
            };

            let completion = AssertUnwindSafe(async move { callback(original, result).await });
            if let Err(panic) = completion.catch_unwind().await {
                log::error!(
                    "Worker {}: callback panicked: {}",
                    self.id,
                    panic_message(panic.as_ref())
                );
            }
        }

        log::debug!("Worker {} finished, queue is closed and drained", self.id);
    }
}

/// Copy of a request for the callback, taken before the original is moved
/// into the transport.
///
/// Streaming bodies cannot be cloned; for those the copy keeps method, URL,
/// headers, timeout and version but has no body.
fn replicate(request: &Request) -> Request {
    request.try_clone().unwrap_or_else(|| {
        let mut copy = Request::new(request.method().clone(), request.url().clone());
        *copy.headers_mut() = request.headers().clone();
        *copy.timeout_mut() = request.timeout().copied();
        *copy.version_mut() = request.version();
        copy
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    #[test]
    fn test_replicate_keeps_request_parts() {
        let mut request = Request::new(Method::POST, "https://example.com/a".parse().unwrap());
        request
            .headers_mut()
            .insert("x-test", "1".parse().unwrap());
        *request.body_mut() = Some("payload".into());

        let copy = replicate(&request);
        assert_eq!(copy.method(), &Method::POST);
        assert_eq!(copy.url(), request.url());
        assert_eq!(copy.headers().get("x-test").unwrap(), "1");
        assert_eq!(
            copy.body().and_then(reqwest::Body::as_bytes),
            Some(b"payload".as_slice())
        );
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "<non-string panic payload>");
    }
}
