//! Rover firmware entry point
//!
//! Builds the sonar array, registers the proximity observers and spawns the
//! tasks. Echo capture runs on a higher-priority interrupt executor so it can
//! pre-empt the sonar scheduler; everything else shares the thread executor.

#![no_std]
#![no_main]

use crate::system::resources::{
    self, AssignedResources, EchoResources, I2cResources, StatusLedResources,
};
use crate::task::{
    echo::echo, expander::expander, indicate::indicate, orchestrate::orchestrate, sonar::sonar,
};
use defmt::{error, info};
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use robotrix::expander::{BoardVersion, FirmwareVersion};
use robotrix::sonar::{Direction, DistanceUnit, EchoQueue, Sonar, SonarConfig};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// System core modules
mod system;
/// Task implementations
mod task;

const BOARD_VERSION: BoardVersion = BoardVersion::V02;
const FIRMWARE_VERSION: FirmwareVersion = FirmwareVersion::V02;

/// Sensors fitted to the trigger expander
const SONARS: u8 = 6;

/// Distance at which an object counts as an obstacle
pub const OBSTACLE_DISTANCE_CM: u32 = 20;

static SONAR: StaticCell<Sonar> = StaticCell::new();
static ECHO_QUEUE: StaticCell<EchoQueue> = StaticCell::new();
static ECHO_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    ECHO_EXECUTOR.on_interrupt()
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());
    let r = split_resources!(p);
    info!("board {:?}, expander firmware {:?}", BOARD_VERSION, FIRMWARE_VERSION);

    let config = SonarConfig::default().set_sensors(SONARS).unwrap_or_else(|e| {
        error!("{:?}, using all sensors", e);
        SonarConfig::default()
    });
    let array: &'static Sonar = SONAR.init(Sonar::new(config));
    for direction in Direction::ALL.into_iter().take(config.sensors()) {
        if let Err(e) = array.on_object_detected(
            direction,
            OBSTACLE_DISTANCE_CM,
            DistanceUnit::Centimeters,
            system::event::object_detected,
        ) {
            error!("no observer on {:?}: {:?}", direction, e);
        }
    }
    let (producer, consumer) = ECHO_QUEUE.init(EchoQueue::new()).split();
    let bus = resources::init_i2c(r.i2c);

    // Echo capture pre-empts the scheduler
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let echo_spawner = ECHO_EXECUTOR.start(interrupt::SWI_IRQ_1);
    echo_spawner.spawn(echo(r.echo, array, producer)).unwrap();

    spawner.spawn(indicate(r.status_led)).unwrap();
    spawner.spawn(expander(bus, BOARD_VERSION, FIRMWARE_VERSION)).unwrap();
    spawner.spawn(orchestrate(array)).unwrap();
    spawner.spawn(sonar(array, consumer, bus)).unwrap();
}
