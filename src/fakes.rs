//! Host-side stand-ins for the board peripherals

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, Operation};

use crate::sonar::Clock;

/// Simulated monotonic time in microseconds, shared by clones
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    micros: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn micros(&self) -> u64 {
        self.micros.get()
    }

    pub fn advance_micros(&self, micros: u64) {
        self.micros.set(self.micros.get() + micros);
    }
}

impl Clock for SimClock {
    fn now(&self) -> Instant {
        Instant::from_micros(self.micros.get())
    }
}

/// Delay that completes immediately and moves the simulated clock instead
pub struct FakeDelay {
    clock: SimClock,
}

impl FakeDelay {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
        }
    }
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_micros(u64::from(ns.div_ceil(1_000)));
    }
}

/// I2C bus recording every write and answering reads from a script
#[derive(Debug, Default)]
pub struct RecordingBus {
    pub writes: Vec<(u8, Vec<u8>)>,
    pub replies: VecDeque<Vec<u8>>,
}

impl RecordingBus {
    pub fn with_replies(replies: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            writes: Vec::new(),
            replies: replies.into_iter().collect(),
        }
    }

    /// Writes decoded as little-endian words
    pub fn words(&self) -> Vec<u32> {
        self.writes
            .iter()
            .map(|(_, bytes)| u32::from_le_bytes(bytes.as_slice().try_into().unwrap()))
            .collect()
    }
}

impl ErrorType for RecordingBus {
    type Error = ErrorKind;
}

impl I2c for RecordingBus {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for operation in operations {
            match operation {
                Operation::Write(bytes) => self.writes.push((address, bytes.to_vec())),
                Operation::Read(buffer) => {
                    let reply = self.replies.pop_front().unwrap_or_default();
                    buffer.fill(0);
                    let len = reply.len().min(buffer.len());
                    buffer[..len].copy_from_slice(&reply[..len]);
                }
            }
        }
        Ok(())
    }
}

/// Bus with nothing attached
pub struct FailingBus;

impl ErrorType for FailingBus {
    type Error = ErrorKind;
}

impl I2c for FailingBus {
    async fn transaction(
        &mut self,
        _address: u8,
        _operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        Err(ErrorKind::Other)
    }
}
