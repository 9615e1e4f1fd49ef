//! Orchestrator Module
//!
//! Reacts to proximity events: anything showing up ahead stops the motors and
//! turns the indicator red. While something is near, the orchestrator polls
//! the sonar array and switches the indicator back once every direction is
//! clear again.

use defmt::info;
use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};
use robotrix::expander::ExpanderCommand;
use robotrix::sonar::{Direction, DistanceUnit, Sonar};

use crate::system::event::{self, Events};
use crate::system::indicator::{self, Indicator};
use crate::task::expander::send_command;
use crate::OBSTACLE_DISTANCE_CM;

/// Interval for the distance report and the clearance check
const STATUS_INTERVAL: Duration = Duration::from_millis(500);

#[embassy_executor::task]
pub async fn orchestrate(sonar: &'static Sonar) {
    info!("Orchestrator started");
    indicator::update(Indicator::Off);
    send_command(ExpanderCommand::EnableMotors).await;

    let mut near = false;
    loop {
        match select(event::wait(), Timer::after(STATUS_INTERVAL)).await {
            Either::First(event) => handle_event(event, &mut near).await,
            Either::Second(()) => {
                if !sonar.is_connected() {
                    continue;
                }
                let distances = sonar.all_distances(DistanceUnit::Centimeters).await;
                info!("distances [cm]: {}", distances.as_str());
                if near && !object_in_range(sonar).await {
                    near = false;
                    info!("all directions clear");
                    indicator::update(Indicator::Clear);
                }
            }
        }
    }
}

async fn handle_event(event: Events, near: &mut bool) {
    match event {
        Events::SonarConnected => {
            info!("sonar array connected");
            indicator::update(Indicator::Clear);
        }
        Events::ObjectDetected(detected) => {
            info!(
                "object on {:?} within {} us",
                detected.direction, detected.threshold_micros
            );
            if is_ahead(detected.direction) {
                send_command(ExpanderCommand::Stop).await;
            }
            *near = true;
            indicator::update(Indicator::Near);
        }
    }
}

fn is_ahead(direction: Direction) -> bool {
    matches!(
        direction,
        Direction::Front | Direction::FrontLeft | Direction::FrontRight
    )
}

async fn object_in_range(sonar: &Sonar) -> bool {
    for direction in Direction::ALL {
        if sonar
            .is_within(direction, OBSTACLE_DISTANCE_CM + 1, DistanceUnit::Centimeters)
            .await
        {
            return true;
        }
    }
    false
}
