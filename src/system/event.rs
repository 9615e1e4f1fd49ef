//! System Events
//!
//! Defines events and channels for inter-task communication.

use defmt::{warn, Format};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use robotrix::sonar::ObjectDetected;

/// Multi-producer, single-consumer event channel with capacity of 10
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, Events, 10> = Channel::new();

/// Sends an event to the system channel
pub async fn send(event: Events) {
    EVENT_CHANNEL.sender().send(event).await;
}

/// Queues an event without waiting; dropped with a warning when the channel is full
pub fn raise(event: Events) {
    if let Err(e) = EVENT_CHANNEL.try_send(event) {
        warn!("event channel full, dropped {:?}", e);
    }
}

/// Receives the next event from the system channel
pub async fn wait() -> Events {
    EVENT_CHANNEL.receiver().receive().await
}

/// Proximity handler registered with the sonar array
///
/// Runs on the sonar scheduler, so it must not block.
pub fn object_detected(detected: ObjectDetected) {
    raise(Events::ObjectDetected(detected));
}

/// System-wide events
#[derive(Debug, Clone, Copy, Format)]
pub enum Events {
    /// Trigger expander answered, distances are live
    SonarConnected,
    /// An object came within an observer's range
    ObjectDetected(ObjectDetected),
}
