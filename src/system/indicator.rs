//! System Indicator Module
//!
//! Latest state to show on the status LED. Uses an embassy-sync Signal, so
//! only the most recent update is kept if the LED task falls behind.
use defmt::Format;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum Indicator {
    /// Sonar array not connected yet
    Off,
    /// Nothing within obstacle range
    Clear,
    /// An object is close
    Near,
}

pub static SYSTEM_INDICATOR_CHANGED: Signal<CriticalSectionRawMutex, Indicator> = Signal::new();

/// Signals a change in the system indicator
pub fn update(value: Indicator) {
    SYSTEM_INDICATOR_CHANGED.signal(value);
}

/// Waits for a change in the system indicator
pub async fn wait() -> Indicator {
    SYSTEM_INDICATOR_CHANGED.wait().await
}
