use dashmap::DashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, sleep_until};

use super::{HostKey, HostStats, HostStatsMap};

/// Admission state of a single host.
///
/// `gate` is held for the whole read-wait-write sequence of
/// [`RateLimiter::block`]. The statistics have their own lock, which is
/// never held across an await, so they can be read while a caller waits.
#[derive(Debug, Default)]
struct Slot {
    gate: tokio::sync::Mutex<()>,
    stats: Mutex<HostStats>,
}

impl Slot {
    fn stats(&self) -> MutexGuard<'_, HostStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Enforces a minimum delay between two admissions to the same host.
///
/// Every host gets its own slot, created on first use and kept for the
/// lifetime of the limiter. Waiting for one host never delays another host.
///
/// # Examples
///
/// ```
/// use dispatch_lib::ratelimit::{HostKey, RateLimiter};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() {
/// let limiter = RateLimiter::new(Duration::from_millis(10));
/// let host = HostKey::from("example.com");
///
/// limiter.block(&host).await; // first admission is immediate
/// limiter.block(&host).await; // waits until 10ms after the first one
/// assert_eq!(limiter.host_stats().get(&host).unwrap().admissions, 2);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RateLimiter {
    /// Minimum interval between two admissions to the same host.
    /// Zero disables rate limiting.
    delay: Mutex<Duration>,

    /// Map of hostname to its admission slot, created on demand
    hosts: DashMap<HostKey, Arc<Slot>>,
}

impl RateLimiter {
    /// Create a limiter enforcing `delay` between admissions to the same host
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(delay),
            hosts: DashMap::new(),
        }
    }

    /// The configured minimum delay
    #[must_use]
    pub fn delay(&self) -> Duration {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the minimum delay. Callers already waiting keep the delay
    /// they started with.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    /// Returns `true` if a non-zero delay is configured
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.delay().is_zero()
    }

    /// Wait until `host` may be contacted again, then record the admission.
    ///
    /// Returns immediately for a host that was never admitted before and
    /// always when the delay is zero. Concurrent callers for the same host
    /// are admitted one after the other, each at least `delay` after the
    /// previous one.
    pub async fn block(&self, host: &HostKey) {
        let delay = self.delay();
        if delay.is_zero() {
            return;
        }

        let slot = self.slot(host);
        let _gate = slot.gate.lock().await;

        let mut waited = Duration::ZERO;
        let previous = slot.stats().last_admission;
        if let Some(previous) = previous {
            let ready_at = previous + delay;
            let now = Instant::now();
            if ready_at > now {
                waited = ready_at - now;
                log::debug!(
                    "Host {host} was contacted {}ms ago, delaying request by {}ms",
                    (now - previous).as_millis(),
                    waited.as_millis()
                );
                sleep_until(ready_at).await;
            }
        }

        slot.stats().record_admission(Instant::now(), waited);
    }

    /// Snapshot of the admission statistics of every host seen so far.
    ///
    /// Hosts with a caller currently waiting are reported with their state
    /// from before that admission.
    #[must_use]
    pub fn host_stats(&self) -> HostStatsMap {
        self.hosts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats().clone()))
            .collect::<std::collections::HashMap<_, _>>()
            .into()
    }

    /// Number of hosts with an admission slot
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Returns `true` if no host has been admitted yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Get the slot of `host`, creating it on first use.
    ///
    /// The map shard is only locked for the lookup, never while waiting.
    fn slot(&self, host: &HostKey) -> Arc<Slot> {
        if let Some(slot) = self.hosts.get(host) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.hosts.entry(host.clone()).or_default().value())
    }
}
