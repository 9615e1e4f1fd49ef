//! Sonar scheduling task
//!
//! Owns the round-robin scheduler: connects the trigger expander, retrying
//! until it answers, then cycles the sensors for as long as the rover runs.

use defmt::{info, warn};
use embassy_time::{Delay, Duration, Timer};
use robotrix::sonar::{EchoConsumer, Sonar, SonarScheduler, SystemClock, TriggerBus};

use crate::system::event::{send, Events};
use crate::system::resources::{I2cBus, SharedI2c};

/// Time between connection attempts while the trigger expander is silent
const CONNECT_RETRY: Duration = Duration::from_secs(1);

#[embassy_executor::task]
pub async fn sonar(sonar: &'static Sonar, echoes: EchoConsumer<'static>, bus: &'static I2cBus) {
    let trigger = TriggerBus::new(SharedI2c::new(bus));
    let mut scheduler = SonarScheduler::new(sonar, echoes, trigger, Delay, SystemClock);

    while let Err(e) = scheduler.connect().await {
        warn!("sonar array not responding: {:?}", e);
        Timer::after(CONNECT_RETRY).await;
    }
    info!("sonar scheduler running");
    send(Events::SonarConnected).await;

    scheduler.run().await
}
