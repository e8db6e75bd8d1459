use std::fmt::{self, Display};

use anyhow::Result;
use dispatch_lib::ratelimit::HostStatsMap;

/// Formats the per-host statistics of the rate limiter
pub(crate) trait HostStatsFormatter {
    /// Returns `None` if there is nothing to report
    fn format(&self, host_stats: &HostStatsMap) -> Result<Option<String>>;
}

struct HostStatsTable<'a>(&'a HostStatsMap);

impl Display for HostStatsTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sorted_hosts = self.0.sorted();
        let hostname_width = sorted_hosts
            .iter()
            .map(|(host, _)| host.as_str().len())
            .max()
            .unwrap_or(0)
            .max(10);

        writeln!(f, "📊 Per-host Statistics")?;
        writeln!(f, "{}", "─".repeat(hostname_width + 44))?;
        for (host, stats) in sorted_hosts {
            writeln!(
                f,
                "{:<width$} │ {:>6} reqs │ {:>8}ms throttled │ {:>6}ms avg wait",
                host.as_str(),
                stats.admissions,
                stats.throttled.as_millis(),
                stats.average_wait().as_millis(),
                width = hostname_width
            )?;
        }
        Ok(())
    }
}

/// A table with one row per host, busiest host first
pub(crate) struct Table;

impl HostStatsFormatter for Table {
    fn format(&self, host_stats: &HostStatsMap) -> Result<Option<String>> {
        if host_stats.is_empty() {
            return Ok(None);
        }
        Ok(Some(HostStatsTable(host_stats).to_string()))
    }
}

/// A JSON object keyed by host
pub(crate) struct Json;

impl HostStatsFormatter for Json {
    fn format(&self, host_stats: &HostStatsMap) -> Result<Option<String>> {
        if host_stats.is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::to_string(host_stats)?))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use dispatch_lib::ratelimit::{HostKey, HostStats};

    use super::*;

    fn host_stats() -> HostStatsMap {
        HashMap::from([
            (
                HostKey::from("a.example"),
                HostStats {
                    admissions: 3,
                    throttled: Duration::from_millis(300),
                    last_admission: None,
                },
            ),
            (
                HostKey::from("b.example"),
                HostStats {
                    admissions: 1,
                    throttled: Duration::ZERO,
                    last_admission: None,
                },
            ),
        ])
        .into()
    }

    #[test]
    fn test_empty() {
        assert_eq!(Table.format(&HostStatsMap::default()).unwrap(), None);
        assert_eq!(Json.format(&HostStatsMap::default()).unwrap(), None);
    }

    #[test]
    fn test_table_rows_are_sorted() {
        let table = Table.format(&host_stats()).unwrap().unwrap();
        let rows: Vec<&str> = table.lines().skip(2).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("a.example"));
        assert!(rows[0].contains("3 reqs"));
        assert!(rows[0].contains("100ms avg wait"));
        assert!(rows[1].starts_with("b.example"));
    }

    #[test]
    fn test_json() {
        let json = Json.format(&host_stats()).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["a.example"]["admissions"], 3);
        assert_eq!(value["a.example"]["throttled_ms"], 300);
        assert_eq!(value["b.example"]["average_wait_ms"], 0);
    }
}
