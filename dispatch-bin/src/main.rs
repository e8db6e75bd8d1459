//! `dispatch` sends HTTP requests to many URLs concurrently.
//!
//! A fixed number of requests is in flight at any time, and an optional
//! minimum delay keeps requests to the same host apart.
//!
//! The dispatch binary is a wrapper around dispatch-lib, which provides
//! the request pipeline and the per-host rate limiter.
//!
//! Request a couple of URLs:
//! ```sh
//! dispatch https://endler.dev/ https://github.com/lycheeverse
//! ```
//!
//! Read URLs from a file, at most 5 at a time and one request per second
//! to each host:
//! ```sh
//! dispatch --concurrency 5 --rate-limit 1s --input-file urls.txt
//! ```
//!
//! Read URLs from stdin and print one JSON object per response:
//! ```sh
//! cat urls.txt | dispatch --format json -
//! ```
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

use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use anyhow::{Error, Result, bail};
use clap::{Parser, crate_version};
use dispatch_lib::{Callback, Method, Pipeline, callback};
use formatters::{log::init_logging, response::ResponseFormatter};
use log::{error, warn};
use url::Url;

mod client;
mod formatters;
mod options;
mod outcome;
mod stats;
mod url_list;
mod verbosity;

use crate::{
    options::{Config, DISPATCH_CONFIG_FILE, DispatchOptions},
    outcome::Outcome,
    stats::ResponseStats,
};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator.
    #[allow(unused)]
    UnexpectedFailure = 1,
    RequestFailure = 2,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    // See: https://doc.rust-lang.org/stable/std/process/fn.exit.html
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file, command-line- and environment variables
fn load_config() -> Result<DispatchOptions> {
    let mut opts = DispatchOptions::parse();

    init_logging(&opts.config.verbose);

    // Load a potentially existing config file and merge it into the config from
    // the CLI
    if let Some(config_file) = &opts.config_file {
        match Config::load_from_file(config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    } else {
        // Without an explicit config file, the default one is used if it
        // exists. An invalid default file is an error all the same.
        let default_config = PathBuf::from(DISPATCH_CONFIG_FILE);
        if default_config.is_file() {
            match Config::load_from_file(&default_config) {
                Ok(c) => opts.config.merge(c),
                Err(e) => {
                    bail!(
                        "Cannot load default configuration file `{}`: {e:?}",
                        default_config.display()
                    );
                }
            }
        }
    }

    Ok(opts)
}

/// Set up runtime and call dispatch entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            error!("Error while loading config: {e} (dispatch {})", crate_version!());
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;

    match runtime.block_on(run(&opts)) {
        Err(e) if Some(ErrorKind::BrokenPipe) == underlying_io_error_kind(&e) => {
            exit(ExitCode::Success as i32);
        }
        res => res,
    }
}

/// Check if the given error can be traced back to an `io::ErrorKind`
/// This is helpful for troubleshooting the root cause of an error.
/// Code is taken from the anyhow documentation.
fn underlying_io_error_kind(error: &Error) -> Option<io::ErrorKind> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
    }
    None
}

/// Prints every outcome and keeps the running totals.
/// Shared by the callbacks of all requests.
struct Reporter {
    formatter: Box<dyn ResponseFormatter>,
    stats: Mutex<ResponseStats>,
}

impl Reporter {
    fn new(formatter: Box<dyn ResponseFormatter>) -> Self {
        Self {
            formatter,
            stats: Mutex::new(ResponseStats::new()),
        }
    }

    fn report(&self, outcome: &Outcome) {
        self.stats().add(outcome);

        match self.formatter.format_response(outcome) {
            Ok(line) => {
                if let Err(e) = writeln!(io::stdout().lock(), "{line}") {
                    log::debug!("Cannot write response of {}: {e}", outcome.url);
                }
            }
            Err(e) => error!("Cannot format response of {}: {e}", outcome.url),
        }
    }

    /// Callback reporting the outcome of one request, timed from now
    fn callback(self: &Arc<Self>) -> Callback {
        let reporter = Arc::clone(self);
        let submitted = Instant::now();
        callback(move |request, result| async move {
            reporter.report(&Outcome::new(&request, &result, submitted.elapsed()));
        })
    }

    fn stats(&self) -> MutexGuard<'_, ResponseStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Run dispatch on the given inputs
async fn run(opts: &DispatchOptions) -> Result<i32> {
    let cfg = &opts.config;
    let inputs = opts.inputs()?;
    if inputs.is_empty() {
        warn!("No URLs to send requests to");
    }

    let pipeline = Pipeline::with_transport(cfg.concurrency, client::create(cfg)?);
    pipeline.set_rate_limit(cfg.rate_limit);

    let method = Method::from(cfg.method);
    let body = match &cfg.body {
        Some(body) if cfg.method.has_body() => Some(body.clone()),
        Some(_) => {
            warn!("Ignoring `--body` for {method} requests");
            None
        }
        None => None,
    };

    let reporter = Arc::new(Reporter::new(formatters::get_response_formatter(
        &cfg.format,
    )));
    let start = Instant::now();

    for input in &inputs {
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(e) => {
                let error = dispatch_lib::ErrorKind::ParseUrl(input.clone(), e);
                reporter.report(&Outcome::rejected(input, method.as_str(), &error));
                continue;
            }
        };
        pipeline
            .request(
                method.clone(),
                url,
                body.clone().map(reqwest::Body::from),
                reporter.callback(),
            )
            .await?;
    }

    pipeline.close();
    pipeline.wait().await;

    let stats = reporter.stats().clone();
    let summary = formatters::get_stats_formatter(&cfg.format).format(&stats, start.elapsed())?;
    eprintln!("{summary}");

    if cfg.host_stats {
        if !pipeline.is_rate_limited() {
            warn!("Per-host statistics are only recorded with `--rate-limit`");
        }
        let host_stats = pipeline.rate_limiter().host_stats();
        if let Some(table) = formatters::get_host_stats_formatter(&cfg.format).format(&host_stats)? {
            eprintln!("{table}");
        }
    }

    let exit_code = if stats.is_success() {
        ExitCode::Success
    } else {
        ExitCode::RequestFailure
    };
    Ok(exit_code as i32)
}
