use crate::options::{Config, HeaderMapExt};
use anyhow::{Context, Result};
use dispatch_lib::ClientBuilder;
use http::HeaderMap;
use std::time::Duration;

/// Creates a client according to the command-line config
pub(crate) fn create(cfg: &Config) -> Result<reqwest::Client> {
    let headers = HeaderMap::from_header_pairs(&cfg.header)?;
    let timeout = (cfg.timeout > 0).then(|| Duration::from_secs(cfg.timeout));

    ClientBuilder::builder()
        .timeout(timeout)
        .follow_redirects(!cfg.no_redirects)
        .max_redirects(cfg.max_redirects)
        .allow_insecure(cfg.insecure)
        .user_agent(cfg.user_agent.clone())
        .custom_headers(headers)
        .build()
        .client()
        .context("Failed to create request client")
}
