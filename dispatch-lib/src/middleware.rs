//! Composable callback wrappers.
//!
//! A middleware takes a [`Callback`] and returns a new one that runs some
//! behavior before or after (or instead of) the inner callback. Use [`wrap`]
//! to apply several of them at once:
//!
//! ```
//! use dispatch_lib::callback;
//! use dispatch_lib::middleware::{if_no_error, log_failures, wrap};
//!
//! let cb = wrap(
//!     callback(|request, result| async move {
//!         // Only reached for successful requests
//!         let response = result.unwrap();
//!         println!("{} {}", response.status(), request.url());
//!     }),
//!     [if_no_error, log_failures],
//! );
//! # drop(cb);
//! ```

use futures::future::{self, FutureExt};
use reqwest::{Request, Response};

use crate::{Callback, Result};

/// Only invoke `callback` if the transport did not return an error
#[must_use]
pub fn if_no_error(callback: Callback) -> Callback {
    Box::new(move |request: Request, result: Result<Response>| match result {
        Ok(_) => callback(request, result),
        Err(_) => future::ready(()).boxed(),
    })
}

/// Only invoke `callback` if the response has a success (2xx) status
#[must_use]
pub fn if_success(callback: Callback) -> Callback {
    Box::new(move |request: Request, result: Result<Response>| {
        let success = matches!(&result, Ok(response) if response.status().is_success());
        if success {
            callback(request, result)
        } else {
            future::ready(()).boxed()
        }
    })
}

/// Log transport errors and non-success responses, then invoke `callback`
#[must_use]
pub fn log_failures(callback: Callback) -> Callback {
    Box::new(move |request: Request, result: Result<Response>| {
        match &result {
            Err(e) => log::warn!("{} {} failed: {e}", request.method(), request.url()),
            Ok(response) if !response.status().is_success() => log::warn!(
                "{} {} returned {}",
                request.method(),
                request.url(),
                response.status()
            ),
            Ok(_) => {}
        }
        callback(request, result)
    })
}

/// Apply `middleware` to `callback` in order; the last one becomes the
/// outermost wrapper and runs first.
pub fn wrap<I, M>(callback: Callback, middleware: I) -> Callback
where
    I: IntoIterator<Item = M>,
    M: FnOnce(Callback) -> Callback,
{
    middleware
        .into_iter()
        .fold(callback, |callback, apply| apply(callback))
}
