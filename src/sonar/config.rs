//! Ranging configuration
//!
//! Calibration constants, precision modes and the [`SonarConfig`] built once at
//! startup. Only the precision mode can change while the scheduler runs.

use embassy_time::Duration;

use crate::error::{Error, Result};

/// Largest sensor array the trigger expander can address
pub const MAX_SENSORS: usize = 6;

/// Largest sample window per sensor (precision mode)
pub const MAX_MEASUREMENTS: usize = 6;

/// Window size used until a precision mode is selected
pub const DEFAULT_MEASUREMENTS: u8 = 3;

/// Time the scheduler waits after each trigger pulse for the echo to arrive
pub const SCHEDULING_QUANTUM: Duration = Duration::from_millis(5);

/// Extra slack before a missing echo is treated as "nothing in range"
pub const STALE_GUARD: Duration = Duration::from_millis(10);

/// Furthest distance the sensors report, in centimeters
pub const MAX_RANGE_CM: u32 = 300;

/// Round-trip time meaning "no object detected"
pub const MAX_TRAVEL_TIME_MICROS: u32 = MAX_RANGE_CM * DistanceUnit::Centimeters.micros_per_unit();

/// Distance units with their round-trip calibration
///
/// The discriminant is the echo round-trip time in microseconds for one unit of
/// distance (343 m/s, sea level, 20°C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum DistanceUnit {
    Centimeters = 58,
    Inches = 148,
}

impl DistanceUnit {
    /// Round-trip microseconds per unit of distance
    pub const fn micros_per_unit(self) -> u32 {
        self as u32
    }

    /// Converts a round-trip time into whole units, truncating
    pub const fn from_round_trip(self, micros: u32) -> u32 {
        micros / self.micros_per_unit()
    }

    /// Converts a distance into the round-trip time it corresponds to
    pub const fn to_round_trip(self, distance: u32) -> u32 {
        distance.saturating_mul(self.micros_per_unit())
    }
}

/// Trade-off between reading stability and refresh rate
///
/// The value is the number of measurements taken per sensor before the scheduler
/// moves on, which is also the length of the median window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PrecisionMode {
    /// Single sample, fastest full cycle, noisiest
    UltraFast = 1,
    Fast = 2,
    #[default]
    Normal = 4,
    /// Six samples per sensor, slowest full cycle, lowest variance
    Precision = 6,
}

impl PrecisionMode {
    /// Measurements per sensor, and the window length, in this mode
    pub const fn measurements(self) -> u8 {
        self as u8
    }
}

/// Physical sonar positions on the rover, in trigger-bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Direction {
    Front = 0,
    FrontLeft = 1,
    FrontRight = 2,
    Left = 3,
    Right = 4,
    Back = 5,
}

impl Direction {
    /// Every position in channel order; an array of `n` sensors uses the first `n`
    pub const ALL: [Direction; MAX_SENSORS] = [
        Direction::Front,
        Direction::FrontLeft,
        Direction::FrontRight,
        Direction::Left,
        Direction::Right,
        Direction::Back,
    ];

    /// Channel index (and trigger bit) of this position
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Position wired to trigger bit `index`
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Sensor array configuration, selected once at startup
///
/// ```rust
/// use robotrix::sonar::{PrecisionMode, SonarConfig};
///
/// let config = SonarConfig::default()
///     .set_sensors(4)
///     .unwrap()
///     .set_mode(PrecisionMode::Fast);
/// assert_eq!(config.measurements(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SonarConfig {
    sensors: u8,
    measurements: u8,
    mode: Option<PrecisionMode>,
    quantum: Duration,
    stale_guard: Duration,
    max_travel_micros: u32,
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self {
            sensors: MAX_SENSORS as u8,
            measurements: DEFAULT_MEASUREMENTS,
            mode: None,
            quantum: SCHEDULING_QUANTUM,
            stale_guard: STALE_GUARD,
            max_travel_micros: MAX_TRAVEL_TIME_MICROS,
        }
    }
}

impl SonarConfig {
    /// Number of sensors wired to the trigger expander (1..=6)
    pub fn set_sensors(mut self, sensors: u8) -> Result<Self> {
        if sensors == 0 || usize::from(sensors) > MAX_SENSORS {
            return Err(Error::InvalidSensorCount(sensors));
        }
        self.sensors = sensors;
        Ok(self)
    }

    /// Selects the precision mode, replacing the power-on window length
    pub fn set_mode(mut self, mode: PrecisionMode) -> Self {
        self.mode = Some(mode);
        self.measurements = mode.measurements();
        self
    }

    /// Wait after each trigger pulse
    pub fn set_quantum(mut self, quantum: Duration) -> Self {
        self.quantum = quantum;
        self
    }

    /// Slack added to the quantum before a silent sensor is aged
    pub fn set_stale_guard(mut self, guard: Duration) -> Self {
        self.stale_guard = guard;
        self
    }

    /// Fitted sensors
    pub fn sensors(&self) -> usize {
        usize::from(self.sensors)
    }

    /// Measurements per sensor, also the median window length
    pub fn measurements(&self) -> u8 {
        self.measurements
    }

    /// Selected precision mode, `None` while the power-on window is in use
    pub fn mode(&self) -> Option<PrecisionMode> {
        self.mode
    }

    /// Wait after each trigger pulse
    pub fn quantum(&self) -> Duration {
        self.quantum
    }

    /// Slack before a missing echo counts as "nothing in range"
    pub fn stale_guard(&self) -> Duration {
        self.stale_guard
    }

    /// Round trip reported when no object is in range
    pub fn max_travel_micros(&self) -> u32 {
        self.max_travel_micros
    }
}
