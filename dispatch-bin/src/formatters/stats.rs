use std::fmt::{self, Display};
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::stats::ResponseStats;

/// Formats the final summary
pub(crate) trait StatsFormatter {
    fn format(&self, stats: &ResponseStats, elapsed: Duration) -> Result<String>;
}

/// Duration rounded to milliseconds, e.g. `1s 250ms`
fn round_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

struct CompactResponseStats<'a> {
    stats: &'a ResponseStats,
    elapsed: Duration,
}

impl Display for CompactResponseStats<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats;
        write!(
            f,
            "🔍 {} Total (in {}) ✅ {} OK 🚫 {} Failed 💥 {} Errors",
            stats.total,
            humantime::format_duration(round_millis(self.elapsed)),
            stats.successful,
            stats.failures,
            stats.errors,
        )?;
        if stats.timeouts > 0 {
            write!(f, " ⏳ {} Timeouts", stats.timeouts)?;
        }
        if stats.redirects > 0 {
            write!(f, " 🔀 {} Redirects", stats.redirects)?;
        }
        Ok(())
    }
}

/// A single summary line
pub(crate) struct Compact;

impl StatsFormatter for Compact {
    fn format(&self, stats: &ResponseStats, elapsed: Duration) -> Result<String> {
        Ok(CompactResponseStats { stats, elapsed }.to_string())
    }
}

#[derive(Serialize)]
struct JsonResponseStats<'a> {
    #[serde(flatten)]
    stats: &'a ResponseStats,
    duration_ms: u64,
}

/// The summary as a JSON object
pub(crate) struct Json;

impl StatsFormatter for Json {
    fn format(&self, stats: &ResponseStats, elapsed: Duration) -> Result<String> {
        let json = JsonResponseStats {
            stats,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        };
        Ok(serde_json::to_string(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn stats() -> ResponseStats {
        ResponseStats {
            total: 4,
            successful: 2,
            failures: 1,
            errors: 1,
            timeouts: 1,
            redirects: 0,
            status_codes: BTreeMap::from([(200, 2), (500, 1)]),
        }
    }

    #[test]
    fn test_compact() {
        let summary = Compact
            .format(&stats(), Duration::from_micros(1_250_400))
            .unwrap();
        assert_eq!(
            summary,
            "🔍 4 Total (in 1s 250ms) ✅ 2 OK 🚫 1 Failed 💥 1 Errors ⏳ 1 Timeouts"
        );
    }

    #[test]
    fn test_json() {
        let summary = Json.format(&stats(), Duration::from_millis(80)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(value["total"], 4);
        assert_eq!(value["errors"], 1);
        assert_eq!(value["status_codes"]["500"], 1);
        assert_eq!(value["duration_ms"], 80);
    }
}
