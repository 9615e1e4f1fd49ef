//! Sonar trigger expander
//!
//! The trigger lines of all sensors hang off an I2C expander at `0x20` that
//! takes little-endian 32-bit words: `0xFF` enables every sensor, `0x00` pulls
//! all triggers low and `1 << n` raises the trigger of sensor `n`.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;

use super::config::Direction;
use crate::error::{Error, Result};

/// I2C address of the trigger expander
pub const TRIGGER_EXPANDER_ADDR: u8 = 0x20;

const ENABLE_ALL: u32 = 0xFF;
const RESET: u32 = 0x00;

/// Trigger line held low before the pulse
const RESET_LOW_MICROS: u32 = 2;

/// Width of the trigger pulse
const PULSE_HIGH_MICROS: u32 = 10;

/// Driver for the trigger expander
pub struct TriggerBus<I> {
    i2c: I,
}

impl<I: I2c> TriggerBus<I> {
    /// Wraps the bus; nothing is written until [`enable_all`](Self::enable_all)
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Powers up every sensor on the array
    pub async fn enable_all(&mut self) -> Result<()> {
        self.write(ENABLE_ALL).await
    }

    /// Drives every trigger line low
    pub async fn reset(&mut self) -> Result<()> {
        self.write(RESET).await
    }

    /// Fires exactly one sensor: low 2µs, high 10µs, low
    pub async fn fire<D: DelayNs>(&mut self, direction: Direction, delay: &mut D) -> Result<()> {
        self.write(RESET).await?;
        delay.delay_us(RESET_LOW_MICROS).await;
        self.write(1 << direction.index()).await?;
        delay.delay_us(PULSE_HIGH_MICROS).await;
        self.write(RESET).await
    }

    async fn write(&mut self, word: u32) -> Result<()> {
        self.i2c
            .write(TRIGGER_EXPANDER_ADDR, &word.to_le_bytes())
            .await
            .map_err(|_| Error::Bus {
                address: TRIGGER_EXPANDER_ADDR,
            })
    }

    /// Gives the bus back
    pub fn release(self) -> I {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FailingBus, FakeDelay, RecordingBus, SimClock};
    use embassy_futures::block_on;

    #[test]
    fn fire_pulses_one_sensor() {
        let clock = SimClock::new();
        let mut delay = FakeDelay::new(&clock);
        let mut trigger = TriggerBus::new(RecordingBus::default());

        block_on(trigger.fire(Direction::Left, &mut delay)).unwrap();

        let bus = trigger.release();
        assert_eq!(bus.words(), [0x00, 0x08, 0x00]);
        assert!(bus.writes.iter().all(|(address, _)| *address == TRIGGER_EXPANDER_ADDR));
        assert_eq!(clock.micros(), u64::from(RESET_LOW_MICROS + PULSE_HIGH_MICROS));
    }

    #[test]
    fn words_are_little_endian() {
        let mut trigger = TriggerBus::new(RecordingBus::default());
        block_on(trigger.enable_all()).unwrap();
        let bus = trigger.release();
        assert_eq!(bus.writes[0].1, [0xFF, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn bus_failure_is_reported() {
        let mut trigger = TriggerBus::new(FailingBus);
        assert_eq!(
            block_on(trigger.reset()),
            Err(Error::Bus {
                address: TRIGGER_EXPANDER_ADDR
            })
        );
    }
}
