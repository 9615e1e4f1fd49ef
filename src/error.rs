//! Error type shared by the ranging engine and the expander drivers
//!
//! None of these are fatal: the sonar scheduler logs bus failures and keeps
//! cycling, registration errors leave the observer lists untouched.

use thiserror::Error;

use crate::sonar::{Direction, ObserverId};

/// Result alias used throughout the crate
pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// I2C transfer to a board device failed
    #[error("i2c transfer to {address:#04x} failed")]
    Bus { address: u8 },
    /// Proximity thresholds must be positive distances
    #[error("threshold distance must be positive")]
    InvalidThreshold,
    /// The channel already carries the maximum number of observers
    #[error("observer list is full")]
    ObserverLimit,
    #[error("no observer {0:?} registered")]
    UnknownObserver(ObserverId),
    /// The sensor array has fewer channels than the requested direction
    #[error("{0:?} is not part of the sensor array")]
    NoSuchChannel(Direction),
    #[error("sensor count {0} outside 1..=6")]
    InvalidSensorCount(u8),
    /// Board firmware V0.1 does not answer version queries
    #[error("board firmware does not answer version queries")]
    UnsupportedFirmware,
}
