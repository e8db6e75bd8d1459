use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use reqwest::{Request, Response};
use tokio::sync::oneshot;

use crate::Result;

/// Completion handler of a submitted request.
///
/// It receives the request it was submitted with and either the response or
/// the error the transport produced. An `Err` carries no response, so a
/// callback has to handle both arms.
///
/// The returned future is awaited by the worker before it picks up its next
/// request.
pub type Callback = Box<dyn FnOnce(Request, Result<Response>) -> BoxFuture<'static, ()> + Send>;

/// Box an async closure into a [`Callback`].
///
/// ```
/// use dispatch_lib::callback;
///
/// let cb = callback(|request, result| async move {
///     match result {
///         Ok(response) => println!("{} {}", response.status(), request.url()),
///         Err(e) => eprintln!("{} failed: {e}", request.url()),
///     }
/// });
/// # drop(cb);
/// ```
pub fn callback<F, Fut>(f: F) -> Callback
where
    F: FnOnce(Request, Result<Response>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move |request, result| Box::pin(f(request, result)))
}

/// A request bundled with its completion callback.
///
/// Ownership moves from the submitter to the queue and from there to exactly
/// one worker.
pub(crate) struct WorkItem {
    pub(crate) request: Request,
    pub(crate) callback: Callback,
    accepted: oneshot::Sender<()>,
}

impl WorkItem {
    /// Create a new work item and the receiving end of its acceptance
    /// handshake
    pub(crate) fn new(request: Request, callback: Callback) -> (Self, oneshot::Receiver<()>) {
        let (accepted, on_accept) = oneshot::channel();
        let item = Self {
            request,
            callback,
            accepted,
        };
        (item, on_accept)
    }

    /// Signal the submitter that a worker has taken this item and hand out
    /// its parts
    pub(crate) fn accept(self) -> (Request, Callback) {
        // The submitter may have given up waiting; the item is processed anyway.
        let _ = self.accepted.send(());
        (self.request, self.callback)
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("method", self.request.method())
            .field("url", &self.request.url().as_str())
            .finish_non_exhaustive()
    }
}
