// ── Sliding-window admission control ──
//
// One window of call timestamps per endpoint class. The check-evict-wait-
// record sequence for a class runs under that class's async mutex, so
// concurrent loops sharing a class queue up behind each other instead of
// over-admitting.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Extra wait added on top of the computed window remainder so the
/// oldest call has definitely aged out when we re-check.
const ADMISSION_SLACK: Duration = Duration::from_millis(100);

/// Default per-minute limit for a class with no configured entry.
pub const DEFAULT_LIMIT_PER_WINDOW: u32 = 60;

/// Category of upstream API sharing one rate-limit bucket.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EndpointClass {
    Badges,
    Presence,
    Users,
    Places,
    Groups,
}

/// Per-class admission limits over a trailing window.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub window: Duration,
    pub per_class: HashMap<EndpointClass, u32>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            per_class: HashMap::from([
                (EndpointClass::Badges, 60),
                (EndpointClass::Presence, 120),
                (EndpointClass::Users, 600),
                (EndpointClass::Places, 600),
                (EndpointClass::Groups, 600),
            ]),
        }
    }
}

impl RateLimits {
    /// Admission limit for `class`, never below one call per window.
    pub fn limit(&self, class: EndpointClass) -> u32 {
        self.per_class
            .get(&class)
            .copied()
            .unwrap_or(DEFAULT_LIMIT_PER_WINDOW)
            .max(1)
    }
}

/// Sliding-window rate limiter keyed by [`EndpointClass`].
///
/// Cheap to share behind an `Arc`; every clone of the `Arc` sees the same
/// windows, which is what makes the limit global across polling loops.
pub struct RateLimiter {
    limits: RateLimits,
    windows: DashMap<EndpointClass, Arc<Mutex<VecDeque<Instant>>>>,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            windows: DashMap::new(),
        }
    }

    pub fn limits(&self) -> &RateLimits {
        &self.limits
    }

    /// Wait until a call for `class` is admissible, then record it.
    ///
    /// Returns how long the caller was held back (zero when a slot was
    /// free immediately).
    pub async fn await_slot(&self, class: EndpointClass) -> Duration {
        let window = self.window_for(class);
        let limit = self.limits.limit(class);
        let span = self.limits.window;

        let mut calls = window.lock().await;
        let mut waited = Duration::ZERO;

        loop {
            let now = Instant::now();
            while calls
                .front()
                .is_some_and(|&t| now.duration_since(t) >= span)
            {
                calls.pop_front();
            }

            let in_window = u32::try_from(calls.len()).unwrap_or(u32::MAX);
            if in_window < limit {
                break;
            }

            let Some(&oldest) = calls.front() else { break };
            let wait = span.saturating_sub(now.duration_since(oldest)) + ADMISSION_SLACK;
            debug!(
                endpoint = %class,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "rate limit reached, waiting for a slot"
            );
            tokio::time::sleep(wait).await;
            waited += wait;
        }

        calls.push_back(Instant::now());
        waited
    }

    /// Number of calls currently recorded inside the window for `class`.
    pub async fn in_flight(&self, class: EndpointClass) -> usize {
        let window = self.window_for(class);
        let now = Instant::now();
        let calls = window.lock().await;
        calls
            .iter()
            .filter(|&&t| now.duration_since(t) < self.limits.window)
            .count()
    }

    fn window_for(&self, class: EndpointClass) -> Arc<Mutex<VecDeque<Instant>>> {
        Arc::clone(
            self.windows
                .entry(class)
                .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
                .value(),
        )
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimits::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(RateLimits {
            window: Duration::from_secs(60),
            per_class: HashMap::from([(EndpointClass::Badges, limit)]),
        })
    }

    #[test]
    fn endpoint_class_round_trips_through_strings() {
        assert_eq!(EndpointClass::Presence.to_string(), "presence");
        assert_eq!(
            EndpointClass::from_str("groups").unwrap(),
            EndpointClass::Groups
        );
    }

    #[test]
    fn unknown_class_falls_back_to_default_limit() {
        let limits = RateLimits {
            window: Duration::from_secs(60),
            per_class: HashMap::new(),
        };
        assert_eq!(limits.limit(EndpointClass::Users), DEFAULT_LIMIT_PER_WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_under_the_limit_are_not_delayed() {
        let limiter = limiter(3);
        for _ in 0..3 {
            assert_eq!(limiter.await_slot(EndpointClass::Badges).await, Duration::ZERO);
        }
        assert_eq!(limiter.in_flight(EndpointClass::Badges).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn call_over_the_limit_waits_for_oldest_to_expire() {
        let limiter = limiter(3);
        let start = Instant::now();

        limiter.await_slot(EndpointClass::Badges).await;
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.await_slot(EndpointClass::Badges).await;
        limiter.await_slot(EndpointClass::Badges).await;

        limiter.await_slot(EndpointClass::Badges).await;
        let elapsed = start.elapsed();

        // The oldest call was at t=0, so the fourth may only pass at t>=60s.
        assert!(elapsed >= Duration::from_secs(60), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(61), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn classes_do_not_share_windows() {
        let limiter = limiter(1);
        limiter.await_slot(EndpointClass::Badges).await;
        let waited = limiter.await_slot(EndpointClass::Presence).await;
        assert_eq!(waited, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_are_serialized() {
        let limiter = Arc::new(limiter(2));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move {
                limiter.await_slot(EndpointClass::Badges).await;
                start.elapsed()
            }));
        }

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap());
        }
        finished.sort();

        assert!(finished[1] < Duration::from_secs(1));
        assert!(finished[2] >= Duration::from_secs(60));
    }
}
