//! Echo capture task
//!
//! Runs on the interrupt executor so it pre-empts the sonar scheduler. Times
//! each pulse on the shared echo line and hands it to [`PulseCapture`], which
//! attributes it to the channel armed at the rising edge.

use defmt::debug;
use embassy_futures::select::{select, Either};
use embassy_rp::gpio::{Input, Pull};
use embassy_time::{Duration, Instant, Timer};
use robotrix::sonar::{EchoProducer, PulseCapture, Sonar, MAX_TRAVEL_TIME_MICROS};

use crate::system::resources::EchoResources;

/// Echo longer than this means nothing reflected within range
const ECHO_TIMEOUT: Duration = Duration::from_micros(MAX_TRAVEL_TIME_MICROS as u64);

#[embassy_executor::task]
pub async fn echo(r: EchoResources, sonar: &'static Sonar, echoes: EchoProducer<'static>) {
    let mut pin = Input::new(r.echo_pin, Pull::Down);
    let mut capture = PulseCapture::new(sonar.armed(), echoes, MAX_TRAVEL_TIME_MICROS);
    let mut dropped = 0;

    loop {
        pin.wait_for_rising_edge().await;
        let start = Instant::now();
        let channel = capture.rising_edge();

        match select(pin.wait_for_falling_edge(), Timer::after(ECHO_TIMEOUT)).await {
            Either::First(()) => {
                let end = Instant::now();
                let micros = end.saturating_duration_since(start).as_micros();
                capture.on_pulse(channel, end, u32::try_from(micros).unwrap_or(u32::MAX));
            }
            // out of range, let the sensor finish its pulse
            Either::Second(()) => pin.wait_for_low().await,
        }

        if capture.dropped() != dropped {
            dropped = capture.dropped();
            debug!("echo queue full, {} samples dropped", dropped);
        }
    }
}
