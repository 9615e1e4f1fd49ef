//! Echo capture
//!
//! The echo line is shared by every sensor, so an echo can only be attributed
//! to the one channel the scheduler has armed. The capture side runs in
//! interrupt context: it reads the armed channel, filters out-of-range pulses
//! and hands the sample to the scheduler through a lock-free SPSC queue. No
//! sorting or window bookkeeping happens here.

use core::sync::atomic::{AtomicU8, Ordering};

use embassy_time::Instant;
use heapless::spsc::{Consumer, Producer, Queue};

/// Queue slots between capture and scheduler (one slot stays free)
pub const ECHO_QUEUE_SLOTS: usize = 16;

/// Queue type connecting [`PulseCapture`] to the scheduler
pub type EchoQueue = Queue<EchoSample, ECHO_QUEUE_SLOTS>;
pub type EchoProducer<'a> = Producer<'a, EchoSample, ECHO_QUEUE_SLOTS>;
pub type EchoConsumer<'a> = Consumer<'a, EchoSample, ECHO_QUEUE_SLOTS>;

const DISARMED: u8 = u8::MAX;

/// Raw echo tagged with the channel it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EchoSample {
    pub channel: u8,
    pub timestamp: Instant,
    pub micros: u32,
}

/// The single channel currently allowed to receive echoes
#[derive(Debug)]
pub struct ArmedChannel(AtomicU8);

impl ArmedChannel {
    /// Starts disarmed: echoes are dropped until the scheduler arms a channel
    pub const fn new() -> Self {
        Self(AtomicU8::new(DISARMED))
    }

    /// Attributes subsequent rising edges to `channel`
    pub fn arm(&self, channel: u8) {
        self.0.store(channel, Ordering::Release);
    }

    /// Stops attributing echoes to any channel
    pub fn disarm(&self) {
        self.0.store(DISARMED, Ordering::Release);
    }

    /// Channel currently armed, if any
    pub fn current(&self) -> Option<u8> {
        match self.0.load(Ordering::Acquire) {
            DISARMED => None,
            channel => Some(channel),
        }
    }
}

impl Default for ArmedChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt-side half of the ranging engine
pub struct PulseCapture<'a> {
    armed: &'a ArmedChannel,
    echoes: EchoProducer<'a>,
    max_travel_micros: u32,
    dropped: u32,
}

impl<'a> PulseCapture<'a> {
    pub fn new(armed: &'a ArmedChannel, echoes: EchoProducer<'a>, max_travel_micros: u32) -> Self {
        Self {
            armed,
            echoes,
            max_travel_micros,
            dropped: 0,
        }
    }

    /// Latches the armed channel; call on the echo's rising edge
    pub fn rising_edge(&self) -> Option<u8> {
        self.armed.current()
    }

    /// Records a finished echo pulse for the channel latched at its rising edge
    ///
    /// Pulses at or beyond the max travel time, and pulses seen while no channel
    /// was armed, are discarded: a missed echo is not an error. Returns whether
    /// the sample was queued.
    pub fn on_pulse(&mut self, channel: Option<u8>, timestamp: Instant, micros: u32) -> bool {
        let Some(channel) = channel else {
            return false;
        };
        if micros >= self.max_travel_micros {
            return false;
        }
        let sample = EchoSample {
            channel,
            timestamp,
            micros,
        };
        match self.echoes.enqueue(sample) {
            Ok(()) => true,
            Err(_) => {
                self.dropped = self.dropped.wrapping_add(1);
                false
            }
        }
    }

    /// Samples lost because the scheduler fell behind
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sonar::config::MAX_TRAVEL_TIME_MICROS;

    #[test]
    fn tags_echo_with_armed_channel() {
        let armed = ArmedChannel::new();
        let mut queue = EchoQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut capture = PulseCapture::new(&armed, producer, MAX_TRAVEL_TIME_MICROS);

        armed.arm(3);
        let edge = capture.rising_edge();
        // scheduler moves on before the pulse ends
        armed.arm(4);
        assert!(capture.on_pulse(edge, Instant::from_millis(7), 1160));

        assert_eq!(
            consumer.dequeue(),
            Some(EchoSample {
                channel: 3,
                timestamp: Instant::from_millis(7),
                micros: 1160,
            })
        );
    }

    #[test]
    fn discards_out_of_range_and_unarmed_pulses() {
        let armed = ArmedChannel::new();
        let mut queue = EchoQueue::new();
        let (producer, mut consumer) = queue.split();
        let mut capture = PulseCapture::new(&armed, producer, MAX_TRAVEL_TIME_MICROS);

        assert!(!capture.on_pulse(capture.rising_edge(), Instant::from_millis(1), 500));
        armed.arm(0);
        assert!(!capture.on_pulse(capture.rising_edge(), Instant::from_millis(2), MAX_TRAVEL_TIME_MICROS));
        assert!(consumer.dequeue().is_none());
        assert_eq!(capture.dropped(), 0);
    }

    #[test]
    fn counts_overflow() {
        let armed = ArmedChannel::new();
        let mut queue = EchoQueue::new();
        let (producer, _consumer) = queue.split();
        let mut capture = PulseCapture::new(&armed, producer, MAX_TRAVEL_TIME_MICROS);

        armed.arm(1);
        let queued = (0..ECHO_QUEUE_SLOTS)
            .filter(|ms| capture.on_pulse(Some(1), Instant::from_millis(*ms as u64), 600))
            .count();
        assert_eq!(queued, ECHO_QUEUE_SLOTS - 1);
        assert_eq!(capture.dropped(), 1);
    }

    #[test]
    fn disarm_clears_channel() {
        let armed = ArmedChannel::new();
        armed.arm(2);
        assert_eq!(armed.current(), Some(2));
        armed.disarm();
        assert_eq!(armed.current(), None);
    }
}
