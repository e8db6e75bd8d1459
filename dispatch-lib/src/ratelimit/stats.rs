use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;
use serde::ser::SerializeStruct;
use tokio::time::Instant;

use super::HostKey;

/// A [`HashMap`] mapping hosts to their [`HostStats`]
#[derive(Debug, Default, Clone, Serialize)]
pub struct HostStatsMap(HashMap<HostKey, HostStats>);

impl HostStatsMap {
    /// Sort host statistics by admission count (descending order),
    /// breaking ties by host name
    #[must_use]
    pub fn sorted(&self) -> Vec<(HostKey, HostStats)> {
        let mut sorted_hosts: Vec<_> = self.0.clone().into_iter().collect();
        sorted_hosts.sort_by(|(a_key, a), (b_key, b)| {
            b.admissions.cmp(&a.admissions).then_with(|| a_key.cmp(b_key))
        });
        sorted_hosts
    }

    /// Statistics of a single host, if it was ever admitted
    #[must_use]
    pub fn get(&self, host: &HostKey) -> Option<&HostStats> {
        self.0.get(host)
    }

    /// Number of hosts seen by the limiter
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no host has been admitted yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<HostKey, HostStats>> for HostStatsMap {
    fn from(value: HashMap<HostKey, HostStats>) -> Self {
        Self(value)
    }
}

/// Admission statistics of a single host, recorded by the
/// [`RateLimiter`](crate::ratelimit::RateLimiter)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Number of requests admitted for this host
    pub admissions: u64,
    /// Total time requests to this host spent waiting for admission
    pub throttled: Duration,
    /// Moment of the last admission
    pub last_admission: Option<Instant>,
}

impl HostStats {
    /// Record an admission at `now` after having waited `waited`
    pub fn record_admission(&mut self, now: Instant, waited: Duration) {
        self.admissions += 1;
        self.throttled += waited;
        self.last_admission = Some(now);
    }

    /// Average time a request to this host waited for admission
    #[must_use]
    pub fn average_wait(&self) -> Duration {
        match u32::try_from(self.admissions) {
            Ok(0) => Duration::ZERO,
            Ok(admissions) => self.throttled / admissions,
            Err(_) => Duration::ZERO,
        }
    }
}

impl Serialize for HostStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("HostStats", 3)?;
        s.serialize_field("admissions", &self.admissions)?;
        s.serialize_field(
            "throttled_ms",
            &u64::try_from(self.throttled.as_millis()).unwrap_or(u64::MAX),
        )?;
        s.serialize_field(
            "average_wait_ms",
            &u64::try_from(self.average_wait().as_millis()).unwrap_or(u64::MAX),
        )?;
        s.end()
    }
}
