//! Distance queries used by movement and LED logic

use core::fmt::Write;

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::String;

use super::config::{Direction, DistanceUnit};
use super::Sonar;

/// Returned by numeric queries while the array is not connected
pub const NOT_CONNECTED: i32 = -1;

/// Room for six three-digit distances and their separators
pub const ALL_DISTANCES_CAPACITY: usize = 48;

impl<M: RawMutex> Sonar<M> {
    /// Distance to the nearest object seen by `direction`
    ///
    /// Yields once before reading so a caller polling in a tight loop lets the
    /// scheduler refresh the value. Returns the max range when nothing is in
    /// sight and [`NOT_CONNECTED`] before the array is connected or for a
    /// position without a sensor.
    pub async fn distance(&self, direction: Direction, unit: DistanceUnit) -> i32 {
        yield_now().await;
        self.current_distance(direction, unit)
    }

    /// Whether an object is closer than `distance`; false while not connected
    pub async fn is_within(&self, direction: Direction, distance: u32, unit: DistanceUnit) -> bool {
        yield_now().await;
        self.with(|array| {
            array.is_connected()
                && array
                    .median_round_trip(direction)
                    .is_some_and(|micros| unit.from_round_trip(micros) < distance)
        })
    }

    /// Every sensor's distance as `"d0, d1, ..."`, or `"-1"` while not connected
    pub async fn all_distances(&self, unit: DistanceUnit) -> String<ALL_DISTANCES_CAPACITY> {
        yield_now().await;
        self.current_distances(unit)
    }

    /// Non-yielding [`distance`](Self::distance) for callers already at a scheduling point
    pub fn current_distance(&self, direction: Direction, unit: DistanceUnit) -> i32 {
        self.with(|array| {
            if !array.is_connected() {
                return NOT_CONNECTED;
            }
            array
                .median_round_trip(direction)
                .and_then(|micros| i32::try_from(unit.from_round_trip(micros)).ok())
                .unwrap_or(NOT_CONNECTED)
        })
    }

    /// Non-yielding [`all_distances`](Self::all_distances)
    pub fn current_distances(&self, unit: DistanceUnit) -> String<ALL_DISTANCES_CAPACITY> {
        let mut out = String::new();
        self.with(|array| {
            if !array.is_connected() {
                let _ = write!(out, "{}", NOT_CONNECTED);
                return;
            }
            for index in 0..array.sensors() {
                let Some(micros) = Direction::from_index(index)
                    .and_then(|direction| array.median_round_trip(direction))
                else {
                    continue;
                };
                let separator = if index == 0 { "" } else { ", " };
                let _ = write!(out, "{}{}", separator, unit.from_round_trip(micros));
            }
        });
        out
    }
}
