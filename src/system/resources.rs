//! Hardware Resource Management
//!
//! Splits the RP2350 peripherals into per-task groups and owns the one
//! resource that is shared: the I2C bus. The sonar trigger expander (`0x20`)
//! and the motor expander (`0x55`) both hang off I2C0, so tasks reach it
//! through `I2cDevice` handles on a single async mutex.
//!
//! # Resource Groups
//! - Echo: shared echo line of the sonar array
//! - I2C: bus to both expanders
//! - Status LED: red/green PWM indicator

use assign_resources::assign_resources;
use embassy_embedded_hal::shared_bus::asynch::i2c::I2cDevice;
use embassy_rp::bind_interrupts;
use embassy_rp::i2c::{Async as I2cAsync, Config, I2c, InterruptHandler as I2cInterruptHandler};
use embassy_rp::peripherals::{self, I2C0};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use static_cell::StaticCell;

/// I2C0 behind an async mutex, shared by every expander driver
pub type I2cBus = Mutex<CriticalSectionRawMutex, I2c<'static, I2C0, I2cAsync>>;

/// Handle one task holds on the shared bus
pub type SharedI2c = I2cDevice<'static, CriticalSectionRawMutex, I2c<'static, I2C0, I2cAsync>>;

/// Expanders are plain shift-register style parts, standard mode is plenty
const I2C_FREQUENCY: u32 = 100_000;

static I2C_BUS: StaticCell<I2cBus> = StaticCell::new();

/// Brings up I2C0; call once from `main` before spawning tasks
pub fn init_i2c(r: I2cResources) -> &'static I2cBus {
    let mut config = Config::default();
    config.frequency = I2C_FREQUENCY;
    let i2c = I2c::new_async(r.i2c, r.scl, r.sda, Irqs, config);
    I2C_BUS.init(Mutex::new(i2c))
}

assign_resources! {
    /// Echo line shared by all ultrasonic sensors
    echo: EchoResources {
        echo_pin: PIN_14,
    },
    /// I2C bus to the trigger and motor expanders
    i2c: I2cResources {
        i2c: I2C0,
        scl: PIN_13,
        sda: PIN_12,
    },
    /// PWM-controlled status LED pins
    status_led: StatusLedResources {
        pwm_red: PWM_SLICE1,
        pwm_green: PWM_SLICE2,
        red_pin: PIN_2,
        green_pin: PIN_4,
    },
}

bind_interrupts!(pub struct Irqs {
    I2C0_IRQ => I2cInterruptHandler<I2C0>;
});
