//! Proximity observers with hysteresis
//!
//! An observer fires once when the median round trip drops to or below its
//! threshold, then stays quiet until the object moves back out of range.

use heapless::Vec;

use super::config::Direction;
use crate::error::{Error, Result};

/// Observers per sensor channel
pub const MAX_OBSERVERS: usize = 8;

/// Handle returned by registration, used to remove the observer again
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ObserverId(pub(crate) u32);

/// Notification raised when an object enters an observer's range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ObjectDetected {
    pub direction: Direction,
    /// Round-trip threshold that was crossed, in microseconds
    pub threshold_micros: u32,
    pub observer: ObserverId,
}

/// Callback invoked by the scheduler for each crossing
pub type DetectionHandler = fn(ObjectDetected);

/// Edge-detection state of one observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ObserverState {
    /// Waiting for the median to reach the threshold
    Armed(u32),
    /// Already notified, waiting for the object to leave range
    Fired(u32),
}

impl ObserverState {
    /// Round-trip threshold in microseconds, whatever the state
    pub fn threshold_micros(self) -> u32 {
        match self {
            ObserverState::Armed(threshold) | ObserverState::Fired(threshold) => threshold,
        }
    }
}

/// A threshold crossing found by [`ObserverRegistry::evaluate`]
#[derive(Debug, Clone, Copy)]
pub struct Crossing {
    pub observer: ObserverId,
    pub threshold_micros: u32,
    pub handler: DetectionHandler,
}

#[derive(Debug, Clone, Copy)]
struct Observer {
    id: ObserverId,
    state: ObserverState,
    handler: DetectionHandler,
}

/// Ordered observer list of one sensor channel
#[derive(Debug, Clone, Default)]
pub struct ObserverRegistry {
    observers: Vec<Observer, MAX_OBSERVERS>,
}

impl ObserverRegistry {
    /// Registry with no observers
    pub const fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Appends an armed observer; zero thresholds are rejected and change nothing
    pub fn register(
        &mut self,
        id: ObserverId,
        threshold_micros: u32,
        handler: DetectionHandler,
    ) -> Result<()> {
        if threshold_micros == 0 {
            return Err(Error::InvalidThreshold);
        }
        self.observers
            .push(Observer {
                id,
                state: ObserverState::Armed(threshold_micros),
                handler,
            })
            .map_err(|_| Error::ObserverLimit)
    }

    /// Unregisters `id`; the remaining observers keep their order
    pub fn remove(&mut self, id: ObserverId) -> Result<()> {
        let position = self
            .observers
            .iter()
            .position(|observer| observer.id == id)
            .ok_or(Error::UnknownObserver(id))?;
        self.observers.remove(position);
        Ok(())
    }

    /// Runs edge detection against a freshly computed median
    ///
    /// `raise` is called once per observer whose threshold was reached since
    /// the last evaluation. Leaving range re-arms silently.
    pub fn evaluate(&mut self, median_micros: u32, mut raise: impl FnMut(Crossing)) {
        for observer in self.observers.iter_mut() {
            match observer.state {
                ObserverState::Armed(threshold) if median_micros <= threshold => {
                    raise(Crossing {
                        observer: observer.id,
                        threshold_micros: threshold,
                        handler: observer.handler,
                    });
                    observer.state = ObserverState::Fired(threshold);
                }
                ObserverState::Fired(threshold) if median_micros > threshold => {
                    observer.state = ObserverState::Armed(threshold);
                }
                _ => {}
            }
        }
    }

    /// Current state of `id`, `None` if it is not registered here
    pub fn state(&self, id: ObserverId) -> Option<ObserverState> {
        self.observers
            .iter()
            .find(|observer| observer.id == id)
            .map(|observer| observer.state)
    }

    /// Registered observers
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Whether `id` is registered on this channel
    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.iter().any(|observer| observer.id == id)
    }
}
