//! Multi-sonar ranging engine
//!
//! Up to six ultrasonic sensors share one echo line. The engine is split the
//! way the work is split at runtime:
//!
//! - [`PulseCapture`] runs in interrupt context and queues echo pulses for the
//!   currently armed channel.
//! - [`SonarScheduler`] is the background task: it arms, refreshes, evaluates
//!   and fires each channel in turn, forever.
//! - [`Sonar`] owns the [`SonarArray`] and is the read side used by movement
//!   and LED logic: distances and proximity observers.
//!
//! ```text
//!  echo pin ──► PulseCapture ──spsc──► SonarScheduler ──► SonarArray ◄── Sonar queries
//!                    ▲                      │
//!                    └──── ArmedChannel ◄───┘──► TriggerBus (I2C 0x20)
//! ```

mod capture;
mod config;
mod history;
mod observer;
mod query;
mod scheduler;
mod trigger;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;
use heapless::Vec;

pub use capture::{
    ArmedChannel, EchoConsumer, EchoProducer, EchoQueue, EchoSample, PulseCapture,
    ECHO_QUEUE_SLOTS,
};
pub use config::{
    Direction, DistanceUnit, PrecisionMode, SonarConfig, DEFAULT_MEASUREMENTS, MAX_MEASUREMENTS,
    MAX_RANGE_CM, MAX_SENSORS, MAX_TRAVEL_TIME_MICROS, SCHEDULING_QUANTUM, STALE_GUARD,
};
pub use history::{RoundTrip, RoundTripHistory};
pub use observer::{
    Crossing, DetectionHandler, ObjectDetected, ObserverId, ObserverRegistry, ObserverState,
    MAX_OBSERVERS,
};
pub use query::{ALL_DISTANCES_CAPACITY, NOT_CONNECTED};
pub use scheduler::{Clock, SchedulerState, SonarScheduler, SystemClock};
pub use trigger::{TriggerBus, TRIGGER_EXPANDER_ADDR};

use crate::error::{Error, Result};

/// Ranging state of one physical sensor
#[derive(Debug, Clone)]
pub struct SensorChannel {
    pub history: RoundTripHistory,
    pub observers: ObserverRegistry,
}

impl SensorChannel {
    fn new(max_travel_micros: u32) -> Self {
        Self {
            history: RoundTripHistory::new(max_travel_micros),
            observers: ObserverRegistry::new(),
        }
    }
}

/// A crossing ready to be dispatched once the array is unlocked
#[derive(Debug, Clone, Copy)]
pub struct Notification {
    pub event: ObjectDetected,
    pub handler: DetectionHandler,
}

impl Notification {
    pub fn dispatch(self) {
        (self.handler)(self.event);
    }
}

/// Every sensor channel of the rover, indexed by [`Direction`]
#[derive(Debug, Clone)]
pub struct SonarArray {
    config: SonarConfig,
    channels: Vec<SensorChannel, MAX_SENSORS>,
    connected: bool,
    next_observer: u32,
}

impl SonarArray {
    /// One disconnected channel per configured sensor, windows seeded
    pub fn new(config: SonarConfig) -> Self {
        let channels = (0..config.sensors())
            .map(|_| SensorChannel::new(config.max_travel_micros()))
            .collect();
        Self {
            config,
            channels,
            connected: false,
            next_observer: 0,
        }
    }

    /// Marks the array live and reseeds every window; observers are kept
    pub fn connect(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.history.reset();
        }
        self.connected = true;
    }

    /// Whether the trigger expander acknowledged the last connect
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn config(&self) -> &SonarConfig {
        &self.config
    }

    /// Fitted sensors, the first `n` of [`Direction::ALL`]
    pub fn sensors(&self) -> usize {
        self.channels.len()
    }

    /// Measurements per channel, also the window capacity
    pub fn measurements(&self) -> usize {
        usize::from(self.config.measurements())
    }

    /// Changes the window length used from the next refresh on
    pub fn set_mode(&mut self, mode: PrecisionMode) {
        self.config = self.config.set_mode(mode);
    }

    /// Window and observers of `direction`, `None` without a sensor there
    pub fn channel(&self, direction: Direction) -> Option<&SensorChannel> {
        self.channels.get(direction.index())
    }

    /// Current median round trip, `None` for positions without a sensor
    pub fn median_round_trip(&self, direction: Direction) -> Option<u32> {
        self.channel(direction).map(|channel| channel.history.median())
    }

    /// Appends a drained echo to the window of the channel it was captured for
    ///
    /// The channel's median follows immediately, so queries see the echo even
    /// before that channel's next refresh. Returns whether it was admitted.
    pub fn ingest(&mut self, sample: EchoSample) -> bool {
        let capacity = self.measurements();
        match self.channels.get_mut(usize::from(sample.channel)) {
            Some(channel) => channel.history.append_sample(
                RoundTrip {
                    timestamp: sample.timestamp,
                    micros: sample.micros,
                },
                capacity,
            ),
            None => false,
        }
    }

    /// Ages, trims and re-medians one window, then runs its observers
    ///
    /// Returns the crossings to dispatch; handlers are not called here so they
    /// never run with the array locked.
    pub fn refresh(&mut self, direction: Direction, now: Instant) -> Vec<Notification, MAX_OBSERVERS> {
        let capacity = self.measurements();
        let quantum = self.config.quantum();
        let guard = self.config.stale_guard();
        let mut raised = Vec::new();
        let Some(channel) = self.channels.get_mut(direction.index()) else {
            return raised;
        };

        let median = channel.history.refresh(now, capacity, quantum, guard);
        channel.observers.evaluate(median, |crossing| {
            // at most one crossing per observer, and there are at most MAX_OBSERVERS
            let _ = raised.push(Notification {
                event: ObjectDetected {
                    direction,
                    threshold_micros: crossing.threshold_micros,
                    observer: crossing.observer,
                },
                handler: crossing.handler,
            });
        });
        raised
    }

    /// Adds an armed observer to `direction` under a fresh id
    pub fn register_observer(
        &mut self,
        direction: Direction,
        threshold_micros: u32,
        handler: DetectionHandler,
    ) -> Result<ObserverId> {
        let id = self.free_observer_id();
        let channel = self
            .channels
            .get_mut(direction.index())
            .ok_or(Error::NoSuchChannel(direction))?;
        channel.observers.register(id, threshold_micros, handler)?;
        self.next_observer = id.0.wrapping_add(1);
        Ok(id)
    }

    /// Next id in sequence that no channel is still using
    fn free_observer_id(&self) -> ObserverId {
        let mut id = ObserverId(self.next_observer);
        // at most MAX_SENSORS * MAX_OBSERVERS ids are live, so this ends
        while self.channels.iter().any(|channel| channel.observers.contains(id)) {
            id = ObserverId(id.0.wrapping_add(1));
        }
        id
    }

    /// Unregisters `id` from `direction`
    pub fn remove_observer(&mut self, direction: Direction, id: ObserverId) -> Result<()> {
        self.channels
            .get_mut(direction.index())
            .ok_or(Error::NoSuchChannel(direction))?
            .observers
            .remove(id)
    }
}

/// Shared handle to the sensor array
///
/// Constructed once at startup and lent by reference to the scheduler, the
/// echo capture and every consumer of distances.
pub struct Sonar<M: RawMutex = CriticalSectionRawMutex> {
    array: Mutex<M, RefCell<SonarArray>>,
    armed: ArmedChannel,
}

impl<M: RawMutex> Sonar<M> {
    /// Disconnected array; nothing ranges until a scheduler connects it
    pub fn new(config: SonarConfig) -> Self {
        Self {
            array: Mutex::new(RefCell::new(SonarArray::new(config))),
            armed: ArmedChannel::new(),
        }
    }

    /// Runs `f` with exclusive access to the array
    pub fn with<R>(&self, f: impl FnOnce(&mut SonarArray) -> R) -> R {
        self.array.lock(|array| f(&mut array.borrow_mut()))
    }

    /// Channel the echo capture attributes pulses to
    pub fn armed(&self) -> &ArmedChannel {
        &self.armed
    }

    /// Whether a scheduler connected the array
    pub fn is_connected(&self) -> bool {
        self.with(|array| array.is_connected())
    }

    /// Median round trip of `direction` in microseconds
    pub fn median_round_trip(&self, direction: Direction) -> Option<u32> {
        self.with(|array| array.median_round_trip(direction))
    }

    /// Switches the window length; takes effect on the next scheduling round
    pub fn set_mode(&self, mode: PrecisionMode) {
        info!("sonar precision mode {:?}", mode);
        self.with(|array| array.set_mode(mode));
    }

    /// Calls `handler` once each time an object comes within `distance`
    ///
    /// The observer re-arms when the object moves out of range again. Zero
    /// distances are rejected and register nothing.
    pub fn on_object_detected(
        &self,
        direction: Direction,
        distance: u32,
        unit: DistanceUnit,
        handler: DetectionHandler,
    ) -> Result<ObserverId> {
        let threshold = unit.to_round_trip(distance);
        let registered = self.with(|array| array.register_observer(direction, threshold, handler));
        match registered {
            Ok(id) => debug!("observer {:?} on {:?} at {} us", id, direction, threshold),
            Err(e) => warn!("observer on {:?} rejected: {:?}", direction, e),
        }
        registered
    }

    /// Unregisters an observer returned by [`on_object_detected`](Self::on_object_detected)
    pub fn remove_observer(&self, direction: Direction, id: ObserverId) -> Result<()> {
        self.with(|array| array.remove_observer(direction, id))
    }
}
