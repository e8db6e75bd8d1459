//! Per-host rate limiting.
//!
//! Requests are grouped by the host of their URL. The [`RateLimiter`] keeps
//! the moment of the last admission per host and makes callers wait until
//! the configured delay has passed since then.
//!
//! # Architecture
//!
//! - [`HostKey`]: Represents a hostname/domain for rate limiting
//! - [`RateLimiter`]: Admits requests per host, at most one per delay
//! - [`HostStats`]: Admission statistics for each host

mod key;
mod limiter;
mod stats;

pub use key::HostKey;
pub use limiter::RateLimiter;
pub use stats::{HostStats, HostStatsMap};
