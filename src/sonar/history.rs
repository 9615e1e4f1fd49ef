//! Per-sensor round-trip window and median filter
//!
//! Each sensor keeps the last few echo round-trip times. Once per scheduling
//! round the window is aged (a missing echo becomes a max-travel sample),
//! trimmed to its capacity and the median recomputed, in that order.

use embassy_time::{Duration, Instant};
use heapless::{Deque, Vec};

use super::config::MAX_MEASUREMENTS;

/// Room for a full window plus one admitted echo and one aging sample
const WINDOW_SLOTS: usize = MAX_MEASUREMENTS + 2;

/// One echo round-trip measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RoundTrip {
    pub timestamp: Instant,
    pub micros: u32,
}

/// Sliding window of recent round trips for one sensor
///
/// Never empty: a max-travel sentinel is seeded on creation and on every
/// [`reset`](Self::reset). The stored median is recomputed on every change, so
/// it always matches the samples currently in the window.
#[derive(Debug, Clone)]
pub struct RoundTripHistory {
    trips: Deque<RoundTrip, WINDOW_SLOTS>,
    median: u32,
    max_travel_micros: u32,
}

impl RoundTripHistory {
    /// Empty window holding only the max-travel sentinel
    pub fn new(max_travel_micros: u32) -> Self {
        let mut history = Self {
            trips: Deque::new(),
            median: max_travel_micros,
            max_travel_micros,
        };
        history.reset();
        history
    }

    /// Drops every sample and reseeds the "nothing detected" sentinel
    pub fn reset(&mut self) {
        self.trips.clear();
        self.push(RoundTrip {
            timestamp: Instant::from_ticks(0),
            micros: self.max_travel_micros,
        });
    }

    /// Admits one captured echo
    ///
    /// The window was trimmed to `capacity` before the sensor fired, so this
    /// accepts exactly one echo per trigger and rejects any further ones until
    /// the next round.
    pub fn append_sample(&mut self, trip: RoundTrip, capacity: usize) -> bool {
        if self.trips.len() > capacity {
            return false;
        }
        self.push(trip);
        true
    }

    /// Pushes a max-travel sample if nothing arrived within `quantum + guard`
    ///
    /// Keeps a stale close reading from persisting once the object is gone or
    /// the sensor stopped answering.
    pub fn age_stale_entries(&mut self, now: Instant, quantum: Duration, guard: Duration) -> bool {
        let newest = self
            .trips
            .back()
            .map_or(Instant::from_ticks(0), |trip| trip.timestamp);
        if now.saturating_duration_since(newest) <= quantum + guard {
            return false;
        }
        self.push(RoundTrip {
            timestamp: now,
            micros: self.max_travel_micros,
        });
        true
    }

    /// Evicts the oldest samples until at most `capacity` remain
    pub fn trim_to_capacity(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if self.trips.len() <= capacity {
            return;
        }
        while self.trips.len() > capacity {
            self.trips.pop_front();
        }
        self.recompute_median();
    }

    /// Lower median of the window: index `(len - 1) / 2` of the sorted values
    pub fn recompute_median(&mut self) -> u32 {
        let mut sorted: Vec<u32, WINDOW_SLOTS> = self.trips.iter().map(|trip| trip.micros).collect();
        sorted.sort_unstable();
        self.median = sorted
            .get(sorted.len().saturating_sub(1) / 2)
            .copied()
            .unwrap_or(self.max_travel_micros);
        self.median
    }

    /// Age, then trim, in the order one scheduling round requires
    ///
    /// Returns the median of what is left.
    pub fn refresh(&mut self, now: Instant, capacity: usize, quantum: Duration, guard: Duration) -> u32 {
        self.age_stale_entries(now, quantum, guard);
        self.trim_to_capacity(capacity);
        self.median
    }

    /// Lower median of the samples currently in the window, in microseconds
    pub fn median(&self) -> u32 {
        self.median
    }

    /// Samples in the window, including an aged or seeded sentinel
    pub fn len(&self) -> usize {
        self.trips.len()
    }

    /// Only true transiently inside [`reset`](Self::reset)
    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    /// Samples from oldest to newest
    pub fn samples(&self) -> impl Iterator<Item = &RoundTrip> {
        self.trips.iter()
    }

    fn push(&mut self, trip: RoundTrip) {
        if self.trips.is_full() {
            self.trips.pop_front();
        }
        // cannot fail, a slot was just freed
        let _ = self.trips.push_back(trip);
        self.recompute_median();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sonar::config::{MAX_TRAVEL_TIME_MICROS, SCHEDULING_QUANTUM, STALE_GUARD};
    use proptest::prelude::*;

    fn trip(ms: u64, micros: u32) -> RoundTrip {
        RoundTrip {
            timestamp: Instant::from_millis(ms),
            micros,
        }
    }

    #[test]
    fn starts_with_sentinel() {
        let history = RoundTripHistory::new(MAX_TRAVEL_TIME_MICROS);
        assert_eq!(history.len(), 1);
        assert_eq!(history.median(), MAX_TRAVEL_TIME_MICROS);
    }

    #[test]
    fn even_window_takes_lower_median() {
        let mut history = RoundTripHistory::new(MAX_TRAVEL_TIME_MICROS);
        history.append_sample(trip(1, 100), 2);
        history.append_sample(trip(2, 200), 2);
        history.trim_to_capacity(2);
        assert_eq!(history.recompute_median(), 100);
    }

    #[test]
    fn admits_one_echo_per_round() {
        let mut history = RoundTripHistory::new(MAX_TRAVEL_TIME_MICROS);
        let capacity = 1;
        assert!(history.append_sample(trip(1, 500), capacity));
        assert!(!history.append_sample(trip(2, 600), capacity));
        history.trim_to_capacity(capacity);
        assert!(history.append_sample(trip(3, 700), capacity));
    }

    #[test]
    fn appended_echo_updates_median_at_once() {
        let mut history = RoundTripHistory::new(MAX_TRAVEL_TIME_MICROS);
        assert!(history.append_sample(trip(1, 1160), 1));
        assert_eq!(history.median(), 1160);

        history.trim_to_capacity(1);
        assert_eq!(history.median(), 1160);
        assert!(history.age_stale_entries(Instant::from_millis(20), SCHEDULING_QUANTUM, STALE_GUARD));
        history.trim_to_capacity(1);
        assert_eq!(history.median(), MAX_TRAVEL_TIME_MICROS);
    }

    #[test]
    fn silent_sensor_ages_back_to_max_travel() {
        let mut history = RoundTripHistory::new(MAX_TRAVEL_TIME_MICROS);
        let capacity = 3;
        for ms in 1..=3 {
            history.append_sample(trip(ms, 580), capacity);
            history.refresh(Instant::from_millis(ms), capacity, SCHEDULING_QUANTUM, STALE_GUARD);
        }
        assert_eq!(history.median(), 580);

        // within quantum + guard nothing is injected
        assert!(!history.age_stale_entries(Instant::from_millis(18), SCHEDULING_QUANTUM, STALE_GUARD));

        let mut now = 19;
        for _ in 0..2 {
            history.refresh(Instant::from_millis(now), capacity, SCHEDULING_QUANTUM, STALE_GUARD);
            now += 16;
        }
        assert_eq!(history.median(), MAX_TRAVEL_TIME_MICROS);
    }

    #[test]
    fn sentinel_is_not_aged_at_boot() {
        let mut history = RoundTripHistory::new(MAX_TRAVEL_TIME_MICROS);
        assert!(!history.age_stale_entries(Instant::from_millis(5), SCHEDULING_QUANTUM, STALE_GUARD));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn reset_reseeds_sentinel() {
        let mut history = RoundTripHistory::new(MAX_TRAVEL_TIME_MICROS);
        history.append_sample(trip(1, 300), 3);
        history.recompute_median();
        history.reset();
        assert_eq!(history.len(), 1);
        assert_eq!(history.median(), MAX_TRAVEL_TIME_MICROS);
    }

    fn lower_median(history: &RoundTripHistory) -> u32 {
        let mut window: std::vec::Vec<u32> = history.samples().map(|t| t.micros).collect();
        window.sort_unstable();
        window[(window.len() - 1) / 2]
    }

    #[derive(Debug, Clone)]
    enum Op {
        Append(u32),
        Age(u64),
        Trim,
        Reset,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (1u32..MAX_TRAVEL_TIME_MICROS).prop_map(Op::Append),
            2 => (0u64..30).prop_map(Op::Age),
            2 => Just(Op::Trim),
            1 => Just(Op::Reset),
        ]
    }

    proptest! {
        #[test]
        fn stored_median_tracks_every_change(
            capacity in 1usize..=MAX_MEASUREMENTS,
            ops in prop::collection::vec(op(), 0..40),
        ) {
            let mut history = RoundTripHistory::new(MAX_TRAVEL_TIME_MICROS);
            let mut ms = 0;
            for op in ops {
                match op {
                    Op::Append(micros) => {
                        ms += 1;
                        history.append_sample(trip(ms, micros), capacity);
                    }
                    Op::Age(elapsed) => {
                        ms += elapsed;
                        history.age_stale_entries(Instant::from_millis(ms), SCHEDULING_QUANTUM, STALE_GUARD);
                    }
                    Op::Trim => history.trim_to_capacity(capacity),
                    Op::Reset => history.reset(),
                }
                prop_assert_eq!(history.median(), lower_median(&history));
            }
        }

        #[test]
        fn trim_keeps_most_recent_samples(
            capacity in 1usize..=MAX_MEASUREMENTS,
            durations in prop::collection::vec(1u32..MAX_TRAVEL_TIME_MICROS, 0..20),
        ) {
            let mut history = RoundTripHistory::new(MAX_TRAVEL_TIME_MICROS);
            let mut appended = std::vec![MAX_TRAVEL_TIME_MICROS];
            for (ms, micros) in durations.iter().enumerate() {
                prop_assert!(history.append_sample(trip(ms as u64 + 1, *micros), capacity));
                appended.push(*micros);
                history.trim_to_capacity(capacity);
                prop_assert!(history.len() <= capacity);
            }
            let kept: std::vec::Vec<u32> = history.samples().map(|t| t.micros).collect();
            let expected = &appended[appended.len().saturating_sub(capacity)..];
            prop_assert_eq!(kept.as_slice(), expected);
        }

        #[test]
        fn median_splits_window(
            capacity in 1usize..=MAX_MEASUREMENTS,
            durations in prop::collection::vec(1u32..MAX_TRAVEL_TIME_MICROS, 1..=MAX_MEASUREMENTS),
        ) {
            let mut history = RoundTripHistory::new(MAX_TRAVEL_TIME_MICROS);
            for (ms, micros) in durations.iter().enumerate() {
                history.append_sample(trip(ms as u64 + 1, *micros), capacity);
                history.trim_to_capacity(capacity);
            }
            let median = history.recompute_median();
            let window: std::vec::Vec<u32> = history.samples().map(|t| t.micros).collect();
            let below = window.iter().filter(|&&v| v < median).count();
            let at_or_below = window.iter().filter(|&&v| v <= median).count();

            prop_assert!(window.contains(&median));
            // lower median: at most (n-1)/2 values strictly below, at least (n+1)/2 at or below
            prop_assert!(below <= (window.len() - 1) / 2);
            prop_assert!(at_or_below >= (window.len() + 1) / 2);
            prop_assert_eq!(history.median(), median);
        }
    }
}
