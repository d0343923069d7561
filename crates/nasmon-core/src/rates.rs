//! Rate derivation from cumulative counters.
//!
//! Subsystems such as libvirt domains, QEMU processes and ZFS pools only expose
//! counters that grow for as long as the subsystem runs. [`RateState`] keeps the
//! previous reading per entity so each cycle can turn two readings into a
//! percentage or a per-second rate.
//!
//! Rules shared by every collector:
//! - the stored reading is overwritten every cycle, whether or not a rate could
//!   be computed;
//! - no previous reading, a non-positive time delta or a counter that went
//!   backwards all yield 0;
//! - percentages are clamped to `[0, 100]`;
//! - an entity observed inactive is forgotten immediately, so its next active
//!   cycle starts without a baseline.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

use crate::collector::procfs::CpuTimes;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Nanoseconds per second (libvirt `cpu.time`).
pub const NANOS_PER_SEC: f64 = 1e9;

/// Clock ticks per second for `/proc` CPU counters (USER_HZ).
pub const CLOCK_TICKS_PER_SEC: f64 = 100.0;

// ---------------------------------------------------------------------------
// Delta helpers
// ---------------------------------------------------------------------------

/// Compute u64 delta, returning `None` on counter regression (reset).
pub fn du64(curr: u64, prev: u64) -> Option<u64> {
    curr.checked_sub(prev)
}

/// Native unit of a cumulative CPU-time counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterUnit {
    Nanoseconds,
    ClockTicks,
}

impl CounterUnit {
    /// Counter increments per second of CPU time.
    pub fn per_second(self) -> f64 {
        match self {
            CounterUnit::Nanoseconds => NANOS_PER_SEC,
            CounterUnit::ClockTicks => CLOCK_TICKS_PER_SEC,
        }
    }
}

/// CPU utilisation between two readings of a cumulative CPU-time counter.
///
/// `(delta / unit) / dt_secs / normalization * 100`, clamped to `[0, 100]`.
/// `normalization` is the number of execution units measured against (vCPU
/// count for guest time, 1 for a host process).
pub fn cpu_percent(
    prev: u64,
    curr: u64,
    dt_secs: f64,
    unit: CounterUnit,
    normalization: f64,
) -> f64 {
    if dt_secs <= 0.0 || normalization <= 0.0 {
        return 0.0;
    }
    let Some(delta) = du64(curr, prev) else {
        return 0.0;
    };
    let cpu_secs = delta as f64 / unit.per_second();
    (cpu_secs / dt_secs / normalization * 100.0).clamp(0.0, 100.0)
}

/// Per-second rate between two counter readings. Not clamped above.
pub fn per_second(prev: u64, curr: u64, dt_secs: f64) -> f64 {
    if dt_secs <= 0.0 {
        return 0.0;
    }
    du64(curr, prev).map_or(0.0, |d| d as f64 / dt_secs)
}

/// Busy share of all CPU time between two `/proc/stat` readings.
///
/// busy = total - (idle + iowait). Returns 0 when no time elapsed.
pub fn cpu_busy_percent(prev: &CpuTimes, curr: &CpuTimes) -> f64 {
    let Some(total) = du64(curr.total(), prev.total()) else {
        return 0.0;
    };
    if total == 0 {
        return 0.0;
    }
    let idle = du64(curr.idle_all(), prev.idle_all()).unwrap_or(0);
    let busy = total.saturating_sub(idle);
    (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Seconds between two timestamps, negative if `now` is earlier.
pub fn elapsed_secs(prev: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let delta = now - prev;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

// ---------------------------------------------------------------------------
// Rate state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RateEntry<S> {
    sample: S,
    at: DateTime<Utc>,
}

/// Previous counter readings keyed by entity identity.
///
/// Owned by exactly one collector and only touched from its own pass.
#[derive(Debug, Clone)]
pub struct RateState<K, S> {
    prev_sample: HashMap<K, RateEntry<S>>,
}

impl<K, S> Default for RateState<K, S> {
    fn default() -> Self {
        Self {
            prev_sample: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, S> RateState<K, S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `sample` as the baseline for `key` and returns the previous
    /// baseline with the seconds elapsed since it was taken.
    ///
    /// Returns `None` on the first observation of `key`.
    pub fn observe(&mut self, key: K, sample: S, now: DateTime<Utc>) -> Option<(S, f64)> {
        self.prev_sample
            .insert(key, RateEntry { sample, at: now })
            .map(|prev| (prev.sample, elapsed_secs(prev.at, now)))
    }

    /// Drops the baseline for an entity observed inactive.
    pub fn forget<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.prev_sample.remove(key).is_some()
    }

    /// Keeps only entities for which `keep` returns `true`.
    ///
    /// Used at the end of a cycle to drop entities that vanished from the listing.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.prev_sample.retain(|k, _| keep(k));
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.prev_sample.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.prev_sample.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prev_sample.is_empty()
    }

    pub fn reset(&mut self) {
        self.prev_sample.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    // ---- cpu_percent ----

    #[test]
    fn test_cpu_percent_formula() {
        // 2 s of guest time over 10 s on 4 vCPUs = 5%
        let pct = cpu_percent(1_000_000_000, 3_000_000_000, 10.0, CounterUnit::Nanoseconds, 4.0);
        assert!((pct - 5.0).abs() < 1e-9);

        // 50 ticks over 1 s on one unit = 50%
        let pct = cpu_percent(100, 150, 1.0, CounterUnit::ClockTicks, 1.0);
        assert!((pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_cpu_percent_counter_reset_is_zero() {
        assert_eq!(cpu_percent(5000, 10, 5.0, CounterUnit::ClockTicks, 1.0), 0.0);
    }

    #[test]
    fn test_cpu_percent_non_positive_dt_is_zero() {
        assert_eq!(cpu_percent(0, 500, 0.0, CounterUnit::ClockTicks, 1.0), 0.0);
        assert_eq!(cpu_percent(0, 500, -3.0, CounterUnit::ClockTicks, 1.0), 0.0);
    }

    #[test]
    fn test_cpu_percent_clamped_to_100() {
        // 10 s of CPU time in 1 s on one unit
        assert_eq!(cpu_percent(0, 1000, 1.0, CounterUnit::ClockTicks, 1.0), 100.0);
    }

    #[test]
    fn test_cpu_percent_zero_normalization() {
        assert_eq!(cpu_percent(0, 1000, 1.0, CounterUnit::Nanoseconds, 0.0), 0.0);
    }

    #[test]
    fn test_per_second() {
        assert_eq!(per_second(1000, 3000, 2.0), 1000.0);
        assert_eq!(per_second(3000, 1000, 2.0), 0.0);
        assert_eq!(per_second(0, 1000, 0.0), 0.0);
    }

    #[test]
    fn test_cpu_busy_percent() {
        let prev = CpuTimes {
            user: 100,
            idle: 800,
            iowait: 100,
            ..Default::default()
        };
        let curr = CpuTimes {
            user: 150,
            system: 25,
            idle: 900,
            iowait: 125,
            ..Default::default()
        };
        // total delta 200, idle delta 125, busy 75
        assert!((cpu_busy_percent(&prev, &curr) - 37.5).abs() < 1e-9);
        assert_eq!(cpu_busy_percent(&curr, &curr), 0.0);
        assert_eq!(cpu_busy_percent(&curr, &prev), 0.0);
    }

    #[test]
    fn test_elapsed_secs() {
        let now = t0() + Duration::milliseconds(2500);
        assert!((elapsed_secs(t0(), now) - 2.5).abs() < 1e-9);
        assert!(elapsed_secs(now, t0()) < 0.0);
    }

    // ---- RateState ----

    #[test]
    fn test_observe_first_has_no_baseline() {
        let mut state: RateState<String, u64> = RateState::new();
        assert!(state.observe("vm1".to_string(), 100, t0()).is_none());
        assert!(state.contains("vm1"));
    }

    #[test]
    fn test_observe_returns_previous_and_overwrites() {
        let mut state: RateState<String, u64> = RateState::new();
        state.observe("vm1".to_string(), 100, t0());

        let (prev, dt) = state
            .observe("vm1".to_string(), 300, t0() + Duration::seconds(10))
            .unwrap();
        assert_eq!(prev, 100);
        assert!((dt - 10.0).abs() < 1e-9);

        let (prev, _) = state
            .observe("vm1".to_string(), 400, t0() + Duration::seconds(20))
            .unwrap();
        assert_eq!(prev, 300);
    }

    #[test]
    fn test_observe_clock_going_backwards() {
        let mut state: RateState<&str, u64> = RateState::new();
        state.observe("pool", 0, t0());
        let (prev, dt) = state.observe("pool", 100, t0() - Duration::seconds(1)).unwrap();
        assert_eq!(cpu_percent(prev, 100, dt, CounterUnit::ClockTicks, 1.0), 0.0);
    }

    #[test]
    fn test_forget_restarts_without_baseline() {
        let mut state: RateState<String, u64> = RateState::new();
        state.observe("vm1".to_string(), 100, t0());
        state.observe("vm1".to_string(), 200, t0() + Duration::seconds(5));

        // VM stops
        assert!(state.forget("vm1"));
        assert!(!state.contains("vm1"));

        // VM starts again: no rate spanning the gap
        assert!(
            state
                .observe("vm1".to_string(), 10, t0() + Duration::seconds(60))
                .is_none()
        );
    }

    #[test]
    fn test_retain_drops_vanished_entities() {
        let mut state: RateState<String, u64> = RateState::new();
        state.observe("a".to_string(), 1, t0());
        state.observe("b".to_string(), 1, t0());
        state.observe("c".to_string(), 1, t0());

        let listed = ["a", "c"];
        state.retain(|k| listed.contains(&k.as_str()));

        assert_eq!(state.len(), 2);
        assert!(!state.contains("b"));

        state.reset();
        assert!(state.is_empty());
    }
}
