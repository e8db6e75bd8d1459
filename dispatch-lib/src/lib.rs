//! `dispatch` is a library for sending many HTTP requests concurrently.
//!
//! Requests are submitted to a [`Pipeline`] together with a [`Callback`].
//! A fixed number of workers execute them and hand every result to its
//! callback. Optionally, requests to the same host are spaced by a minimum
//! delay (see [`ratelimit`]).
//!
//! ```no_run
//! use dispatch_lib::{Pipeline, Result, callback};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let pipeline = Pipeline::new(8)?;
//!   pipeline.set_rate_limit(Duration::from_millis(250));
//!
//!   pipeline
//!     .get("https://github.com/lycheeverse/lychee", callback(|request, result| async move {
//!       match result {
//!         Ok(response) => println!("[{}] {}", response.status(), request.url()),
//!         Err(e) => eprintln!("[ERROR] {} | {e}", request.url()),
//!       }
//!     }))
//!     .await?;
//!
//!   pipeline.close();
//!   pipeline.wait().await;
//!   Ok(())
//! }
//! ```
//!
//! The pipeline executes requests through any [`Transport`]. By default this
//! is a [`reqwest::Client`] configured by [`ClientBuilder`].
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

mod client;
mod pipeline;
mod transport;
mod types;
mod waiter;
mod worker;

pub mod middleware;
pub mod ratelimit;

pub use crate::{
    client::{ClientBuilder, DEFAULT_MAX_REDIRECTS, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT},
    pipeline::{DEFAULT_CONCURRENCY, Pipeline},
    transport::Transport,
    types::{Callback, ErrorKind, Result, callback},
};

// Re-exported so callers can build requests and read responses without a
// direct dependency on `reqwest`
pub use reqwest::{Method, Request, Response};
