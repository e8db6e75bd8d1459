use std::collections::BTreeMap;

use serde::Serialize;

use crate::outcome::Outcome;

/// Running totals over all reported [`Outcome`]s
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct ResponseStats {
    pub(crate) total: usize,
    pub(crate) successful: usize,
    /// Responses with a status of 400 or above
    pub(crate) failures: usize,
    /// Requests without any response
    pub(crate) errors: usize,
    pub(crate) timeouts: usize,
    pub(crate) redirects: usize,
    /// Number of responses per status code
    pub(crate) status_codes: BTreeMap<u16, usize>,
}

impl ResponseStats {
    #[inline]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, outcome: &Outcome) {
        self.total += 1;

        match outcome.status {
            Some(status) => {
                *self.status_codes.entry(status).or_default() += 1;
                if (300..400).contains(&status) {
                    self.redirects += 1;
                }
            }
            None if outcome.timed_out => self.timeouts += 1,
            None => {}
        }

        if outcome.is_success() {
            self.successful += 1;
        } else if outcome.status.is_some() {
            self.failures += 1;
        } else {
            self.errors += 1;
        }
    }

    /// Returns `true` if no request failed
    #[inline]
    pub(crate) const fn is_success(&self) -> bool {
        self.total == self.successful
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcome(status: Option<u16>, error: Option<&str>, timed_out: bool) -> Outcome {
        Outcome {
            url: "https://example.com/".to_string(),
            method: "GET".to_string(),
            status,
            error: error.map(ToString::to_string),
            duration_ms: 1,
            timed_out,
        }
    }

    #[test]
    fn test_stats_success() {
        let mut stats = ResponseStats::new();
        assert!(stats.is_success());

        stats.add(&outcome(Some(200), None, false));
        assert_eq!(stats.total, 1);
        assert!(stats.is_success());
    }

    #[test]
    fn test_stats() {
        let mut stats = ResponseStats::new();
        stats.add(&outcome(Some(200), None, false));
        stats.add(&outcome(Some(200), None, false));
        stats.add(&outcome(Some(301), None, false));
        stats.add(&outcome(Some(503), None, false));
        stats.add(&outcome(None, Some("connection refused"), false));
        stats.add(&outcome(None, Some("timed out"), true));

        assert_eq!(
            stats,
            ResponseStats {
                total: 6,
                successful: 3,
                failures: 1,
                errors: 2,
                timeouts: 1,
                redirects: 1,
                status_codes: BTreeMap::from([(200, 2), (301, 1), (503, 1)]),
            }
        );
        assert!(!stats.is_success());
    }
}
