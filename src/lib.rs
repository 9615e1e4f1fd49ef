//! Robotrix rover controller
//!
//! Hardware agnostic core of the rover firmware:
//! - [`sonar`]: multi-sonar ranging engine. Up to six ultrasonic sensors share
//!   one echo line; a background scheduler triggers them round-robin, filters the
//!   echoes through a per-sensor median window and raises one-shot proximity
//!   notifications.
//! - [`expander`]: command encoding and driver for the I2C motor/board expander.
//!
//! Everything here is generic over `embedded-hal-async` traits so it runs on the
//! RP2350 firmware as well as in host tests.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod error;
pub mod expander;
pub mod sonar;

#[cfg(test)]
mod fakes;

pub use error::{Error, Result};
