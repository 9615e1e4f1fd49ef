//! Motor expander task
//!
//! Serialises motor commands onto the shared I2C bus. Other tasks never touch
//! the motor expander directly; they queue an [`ExpanderCommand`] instead.
//!
//! ```rust
//! expander::send_command(ExpanderCommand::Drive {
//!     mode: DriveMode::Straight,
//!     speed: 40,
//! }).await;
//! ```

use defmt::{error, info, warn};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use robotrix::expander::{BoardVersion, ExpanderCommand, FirmwareVersion, MotorExpander};

use crate::system::resources::{I2cBus, SharedI2c};

/// Command channel for the motor expander
static COMMAND_CHANNEL: Channel<CriticalSectionRawMutex, ExpanderCommand, 8> = Channel::new();

/// Send a command to the motor expander task
pub async fn send_command(command: ExpanderCommand) {
    COMMAND_CHANNEL.sender().send(command).await;
}

#[embassy_executor::task]
pub async fn expander(bus: &'static I2cBus, board: BoardVersion, firmware: FirmwareVersion) {
    let mut expander = MotorExpander::new(SharedI2c::new(bus), firmware);
    info!("Motor expander task starting, board {:?}", board);

    match expander.firmware_version().await {
        Ok(version) => {
            info!("expander firmware {}", version.as_str());
            if let Ok(hardware) = expander.hardware_version().await {
                info!("expander hardware {}", hardware.as_str());
            }
            if let Ok(identity) = expander.identity().await {
                info!("board identity {}", identity.as_str());
            }
        }
        Err(e) => warn!("board info unavailable: {:?}", e),
    }

    loop {
        let command = COMMAND_CHANNEL.receiver().receive().await;
        if let Err(e) = expander.send(command).await {
            error!("expander command {:?} failed: {:?}", command, e);
        }
    }
}
