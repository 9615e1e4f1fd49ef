//! Motor and board expander
//!
//! The motor controller sits behind an I2C expander at `0x55` that takes
//! 32-bit big-endian command frames. The first byte selects the command:
//!
//! | frame           | command                                   |
//! |-----------------|-------------------------------------------|
//! | `10 01 00 00`   | enable motor drivers                      |
//! | `10 00 00 00`   | disable motor drivers                     |
//! | `20 00 00 00`   | stop                                      |
//! | `21 mm ss 00`   | drive in mode `mm` at speed `ss`          |
//! | `11 ii ss 00`   | run motor `ii` at speed `ss`              |
//! | `12 s1 s2 s3`   | run all three motors                      |
//! | `03 0q 00 00`   | board info query `q`, answered by a read  |
//!
//! Speeds are given in percent (-100..=100), scaled to -127..=127 and sent
//! sign-magnitude: bit 7 set means reverse.

use embedded_hal_async::i2c::I2c;
use heapless::String;

use crate::error::{Error, Result};

/// I2C address of the motor expander
pub const MOTOR_EXPANDER_ADDR: u8 = 0x55;

/// Longest board info reply
pub const BOARD_INFO_CAPACITY: usize = 16;

/// Movement patterns understood by the expander
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DriveMode {
    Straight = 0,
    Slide = 1,
    TurnAround = 2,
    TurnRear = 3,
    TurnFront = 4,
    DiagLeft = 5,
    DiagRight = 6,
}

/// Expander firmware revision; `V01` predates board info queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirmwareVersion {
    V01,
    V02,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardVersion {
    V01,
    V02,
}

/// Commands accepted by [`MotorExpander::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExpanderCommand {
    EnableMotors,
    DisableMotors,
    Stop,
    Drive { mode: DriveMode, speed: i8 },
    RunMotor { index: u8, speed: i8 },
    RunMotors([i8; 3]),
}

impl ExpanderCommand {
    /// The 32-bit frame written to the expander
    pub fn frame(self) -> u32 {
        let bytes = match self {
            ExpanderCommand::EnableMotors => [0x10, 0x01, 0x00, 0x00],
            ExpanderCommand::DisableMotors => [0x10, 0x00, 0x00, 0x00],
            ExpanderCommand::Stop => [0x20, 0x00, 0x00, 0x00],
            ExpanderCommand::Drive { mode, speed } => [0x21, mode as u8, encode_speed(speed), 0x00],
            ExpanderCommand::RunMotor { index, speed } => [0x11, index, encode_speed(speed), 0x00],
            ExpanderCommand::RunMotors([m1, m2, m3]) => {
                [0x12, encode_speed(m1), encode_speed(m2), encode_speed(m3)]
            }
        };
        u32::from_be_bytes(bytes)
    }
}

/// Scales a speed percentage to the expander's sign-magnitude byte
///
/// Out-of-range percentages are clamped.
pub fn encode_speed(percent: i8) -> u8 {
    let scaled = i16::from(percent.clamp(-100, 100)) * 127 / 100;
    // |scaled| <= 127, both arms fit in a byte
    let magnitude = scaled.unsigned_abs() as u8;
    if scaled < 0 {
        0x80 | magnitude
    } else {
        magnitude
    }
}

/// Board information the expander reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BoardQuery {
    FirmwareVersion,
    HardwareVersion,
    /// Board identity string
    Identity,
}

impl BoardQuery {
    fn request(self) -> u32 {
        match self {
            BoardQuery::FirmwareVersion => 0x0301_0000,
            BoardQuery::HardwareVersion => 0x0302_0000,
            BoardQuery::Identity => 0x0303_0000,
        }
    }

    fn reply_len(self) -> usize {
        match self {
            BoardQuery::FirmwareVersion | BoardQuery::HardwareVersion => 4,
            BoardQuery::Identity => 11,
        }
    }
}

/// Driver for the motor expander
pub struct MotorExpander<I> {
    i2c: I,
    firmware: FirmwareVersion,
}

impl<I: I2c> MotorExpander<I> {
    /// Board info queries are only answered from firmware `V02` on
    pub fn new(i2c: I, firmware: FirmwareVersion) -> Self {
        Self { i2c, firmware }
    }

    /// Writes the frame of `command`
    pub async fn send(&mut self, command: ExpanderCommand) -> Result<()> {
        trace!("expander command {:?}", command);
        self.write(command.frame()).await
    }

    pub async fn enable_motors(&mut self) -> Result<()> {
        self.send(ExpanderCommand::EnableMotors).await
    }

    pub async fn disable_motors(&mut self) -> Result<()> {
        self.send(ExpanderCommand::DisableMotors).await
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.send(ExpanderCommand::Stop).await
    }

    /// Moves the rover in `mode` at `speed` percent; negative reverses
    pub async fn drive(&mut self, mode: DriveMode, speed: i8) -> Result<()> {
        self.send(ExpanderCommand::Drive { mode, speed }).await
    }

    pub async fn run_motor(&mut self, index: u8, speed: i8) -> Result<()> {
        self.send(ExpanderCommand::RunMotor { index, speed }).await
    }

    pub async fn run_motors(&mut self, speeds: [i8; 3]) -> Result<()> {
        self.send(ExpanderCommand::RunMotors(speeds)).await
    }

    pub async fn firmware_version(&mut self) -> Result<String<BOARD_INFO_CAPACITY>> {
        self.query(BoardQuery::FirmwareVersion).await
    }

    pub async fn hardware_version(&mut self) -> Result<String<BOARD_INFO_CAPACITY>> {
        self.query(BoardQuery::HardwareVersion).await
    }

    pub async fn identity(&mut self) -> Result<String<BOARD_INFO_CAPACITY>> {
        self.query(BoardQuery::Identity).await
    }

    /// Asks the expander for a NUL-terminated ASCII string
    pub async fn query(&mut self, query: BoardQuery) -> Result<String<BOARD_INFO_CAPACITY>> {
        if self.firmware <= FirmwareVersion::V01 {
            return Err(Error::UnsupportedFirmware);
        }
        self.write(query.request()).await?;

        let mut reply = [0u8; BOARD_INFO_CAPACITY];
        let reply = &mut reply[..query.reply_len()];
        self.i2c
            .read(MOTOR_EXPANDER_ADDR, reply)
            .await
            .map_err(|_| Error::Bus {
                address: MOTOR_EXPANDER_ADDR,
            })?;
        Ok(decode_c_string(reply))
    }

    /// Gives the bus back
    pub fn release(self) -> I {
        self.i2c
    }

    async fn write(&mut self, frame: u32) -> Result<()> {
        self.i2c
            .write(MOTOR_EXPANDER_ADDR, &frame.to_be_bytes())
            .await
            .map_err(|_| Error::Bus {
                address: MOTOR_EXPANDER_ADDR,
            })
    }
}

fn decode_c_string(bytes: &[u8]) -> String<BOARD_INFO_CAPACITY> {
    let mut text = String::new();
    for byte in bytes.iter().take_while(|byte| **byte != 0) {
        // the reply buffer is never longer than the string
        let _ = text.push(char::from(*byte));
    }
    text
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::fakes::{FailingBus, RecordingBus};

    #[test]
    fn fixed_frames() {
        assert_eq!(ExpanderCommand::EnableMotors.frame(), 0x1001_0000);
        assert_eq!(ExpanderCommand::DisableMotors.frame(), 0x1000_0000);
        assert_eq!(ExpanderCommand::Stop.frame(), 0x2000_0000);
    }

    #[test]
    fn speed_is_scaled_sign_magnitude() {
        assert_eq!(encode_speed(0), 0x00);
        assert_eq!(encode_speed(100), 127);
        assert_eq!(encode_speed(50), 63);
        assert_eq!(encode_speed(-100), 0x80 | 127);
        assert_eq!(encode_speed(-50), 0x80 | 63);
        assert_eq!(encode_speed(i8::MIN), encode_speed(-100));
    }

    #[test]
    fn drive_frame_layout() {
        let frame = ExpanderCommand::Drive {
            mode: DriveMode::TurnAround,
            speed: -100,
        }
        .frame();
        assert_eq!(frame, 0x2102_FF00);

        let frame = ExpanderCommand::RunMotors([100, 0, -100]).frame();
        assert_eq!(frame, 0x127F_00FF);
    }

    #[test]
    fn frames_go_out_big_endian() {
        let mut expander = MotorExpander::new(RecordingBus::default(), FirmwareVersion::V02);
        block_on(expander.run_motor(2, 100)).unwrap();
        let bus = expander.release();
        assert_eq!(bus.writes, [(MOTOR_EXPANDER_ADDR, std::vec![0x11, 0x02, 0x7F, 0x00])]);
    }

    #[test]
    fn reads_board_info() {
        let bus = RecordingBus::with_replies([
            std::vec![b'2', b'.', b'1', 0],
            b"RBX-0042\0\0\0".to_vec(),
        ]);
        let mut expander = MotorExpander::new(bus, FirmwareVersion::V02);

        assert_eq!(block_on(expander.firmware_version()).unwrap().as_str(), "2.1");
        assert_eq!(block_on(expander.identity()).unwrap().as_str(), "RBX-0042");

        let bus = expander.release();
        let requests: std::vec::Vec<_> = bus.writes.iter().map(|(_, bytes)| bytes.clone()).collect();
        assert_eq!(requests, [std::vec![0x03, 0x01, 0, 0], std::vec![0x03, 0x03, 0, 0]]);
    }

    #[test]
    fn old_firmware_has_no_board_info() {
        let mut expander = MotorExpander::new(RecordingBus::default(), FirmwareVersion::V01);
        assert_eq!(
            block_on(expander.hardware_version()),
            Err(Error::UnsupportedFirmware)
        );
        assert!(expander.release().writes.is_empty());
    }

    #[test]
    fn bus_failure_is_reported() {
        let mut expander = MotorExpander::new(FailingBus, FirmwareVersion::V02);
        assert_eq!(
            block_on(expander.stop()),
            Err(Error::Bus {
                address: MOTOR_EXPANDER_ADDR
            })
        );
    }
}
