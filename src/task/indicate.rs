//! Status LED Module
//!
//! Red/green PWM LED showing the proximity state: off until the sonar array
//! connects, green while clear, red while an object is near. Every change is
//! affirmed with a short red/green flicker.
use defmt::info;
use embassy_rp::pwm;
use embassy_rp::pwm::SetDutyCycle;
use embassy_time::{Duration, Timer};

use crate::system::indicator::{self, Indicator};
use crate::system::resources::StatusLedResources;

/// Interval for LED blinking when affirming state change
const AFFIRM_BLINK_INTERVAL: Duration = Duration::from_millis(30);

/// PWM frequency of both LED channels
const PWM_FREQUENCY_HZ: u32 = 100;

#[embassy_executor::task]
pub async fn indicate(r: StatusLedResources) {
    let clock_freq_hz = embassy_rp::clocks::clk_sys_freq();

    // smallest divider that keeps the period within 16 bits
    let divider = ((clock_freq_hz / PWM_FREQUENCY_HZ) / 65535 + 1) as u8;
    let period = (clock_freq_hz / (PWM_FREQUENCY_HZ * divider as u32)) as u16 - 1;

    let mut config = pwm::Config::default();
    config.divider = divider.into();
    config.top = period;
    let mut pwm_red = pwm::Pwm::new_output_a(r.pwm_red, r.red_pin, config.clone());
    let mut pwm_green = pwm::Pwm::new_output_a(r.pwm_green, r.green_pin, config);

    let _ = pwm_red.set_duty_cycle_fully_off();
    let _ = pwm_green.set_duty_cycle_fully_off();

    let mut shown = Indicator::Off;
    loop {
        let state = indicator::wait().await;
        if state == shown {
            continue;
        }
        info!("indicator {:?}", state);

        let mut red_on = false;
        for _ in 0..5 {
            red_on = !red_on;
            let _ = pwm_red.set_duty_cycle_percent(if red_on { 100 } else { 0 });
            let _ = pwm_green.set_duty_cycle_percent(if red_on { 0 } else { 100 });
            Timer::after(AFFIRM_BLINK_INTERVAL).await;
        }

        let (red, green) = match state {
            Indicator::Off => (0, 0),
            Indicator::Clear => (0, 100),
            Indicator::Near => (100, 0),
        };
        let _ = pwm_red.set_duty_cycle_percent(red);
        let _ = pwm_green.set_duty_cycle_percent(green);
        shown = state;
    }
}
