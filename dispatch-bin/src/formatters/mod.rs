pub(crate) mod host_stats;
pub(crate) mod log;
pub(crate) mod response;
pub(crate) mod stats;

use crate::options::OutputFormat;

use self::{host_stats::HostStatsFormatter, response::ResponseFormatter, stats::StatsFormatter};

/// Create a formatter for the per-request lines
pub(crate) fn get_response_formatter(format: &OutputFormat) -> Box<dyn ResponseFormatter> {
    match format {
        OutputFormat::Plain => Box::new(response::Plain),
        OutputFormat::Json => Box::new(response::Json),
    }
}

/// Create a formatter for the final summary
pub(crate) fn get_stats_formatter(format: &OutputFormat) -> Box<dyn StatsFormatter> {
    match format {
        OutputFormat::Plain => Box::new(stats::Compact),
        OutputFormat::Json => Box::new(stats::Json),
    }
}

/// Create a formatter for the per-host rate limiter statistics
pub(crate) fn get_host_stats_formatter(format: &OutputFormat) -> Box<dyn HostStatsFormatter> {
    match format {
        OutputFormat::Plain => Box::new(host_stats::Table),
        OutputFormat::Json => Box::new(host_stats::Json),
    }
}
