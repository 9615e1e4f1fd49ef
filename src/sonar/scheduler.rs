//! Round-robin sonar scheduler
//!
//! One step arms a channel, folds the echoes captured since the last step into
//! the windows, refreshes the armed channel's median, runs its observers,
//! fires the sensor and waits one quantum. Each channel gets
//! `measurements` consecutive steps before the next one is armed.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::signal::Signal;
use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::I2c;
use heapless::Vec;

use super::capture::EchoConsumer;
use super::config::Direction;
use super::observer::MAX_OBSERVERS;
use super::trigger::TriggerBus;
use super::{Notification, Sonar};
use crate::error::Result;

/// Source of sample timestamps
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The embassy time driver
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Where the scheduler is within the current step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SchedulerState {
    Idle,
    /// Echoes are attributed to this channel
    Armed(Direction),
    /// Window aged, trimmed and re-medianed
    Settling(Direction),
    /// Observers ran; the sensor is fired next
    Evaluated(Direction),
}

/// Background task driving the array: one channel per quantum
pub struct SonarScheduler<'a, I, D, C = SystemClock, M: RawMutex = CriticalSectionRawMutex> {
    sonar: &'a Sonar<M>,
    echoes: EchoConsumer<'a>,
    trigger: TriggerBus<I>,
    delay: D,
    clock: C,
    current: Direction,
    round: u8,
    state: SchedulerState,
}

impl<'a, I, D, C, M> SonarScheduler<'a, I, D, C, M>
where
    I: I2c,
    D: DelayNs,
    C: Clock,
    M: RawMutex,
{
    pub fn new(
        sonar: &'a Sonar<M>,
        echoes: EchoConsumer<'a>,
        trigger: TriggerBus<I>,
        delay: D,
        clock: C,
    ) -> Self {
        Self {
            sonar,
            echoes,
            trigger,
            delay,
            clock,
            current: Direction::Front,
            round: 0,
            state: SchedulerState::Idle,
        }
    }

    /// Enables every sensor and marks the array connected
    ///
    /// The array stays disconnected, and queries keep returning `-1`, if the
    /// trigger expander does not acknowledge.
    pub async fn connect(&mut self) -> Result<()> {
        self.trigger.enable_all().await?;
        self.sonar.with(|array| array.connect());
        info!("sonar array connected");
        Ok(())
    }

    /// Where the last step ended, `Idle` before the first one
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Channel the next step will arm
    pub fn current(&self) -> Direction {
        self.current
    }

    /// Runs one scheduling step for the current channel
    pub async fn step(&mut self) {
        let direction = self.current;
        for notification in self.prepare(direction) {
            debug!(
                "object within {} us on {:?}",
                notification.event.threshold_micros, direction
            );
            notification.dispatch();
        }

        if let Err(e) = self.trigger.fire(direction, &mut self.delay).await {
            warn!("failed to trigger {:?}: {:?}", direction, e);
        }

        let quantum = self.sonar.with(|array| array.config().quantum());
        self.delay
            .delay_us(u32::try_from(quantum.as_micros()).unwrap_or(u32::MAX))
            .await;
        self.advance();
    }

    /// Steps forever
    pub async fn run(&mut self) -> ! {
        loop {
            self.step().await;
        }
    }

    /// Steps until `stop` is signalled, then quiets the array
    pub async fn run_until<S: RawMutex>(&mut self, stop: &Signal<S, ()>) {
        loop {
            if let Either::First(()) = select(stop.wait(), self.step()).await {
                break;
            }
        }
        self.shutdown().await;
    }

    /// Gives the trigger bus back
    pub fn release(self) -> I {
        self.trigger.release()
    }

    /// Arm, drain, refresh and evaluate; the lock is released on return
    fn prepare(&mut self, direction: Direction) -> Vec<Notification, MAX_OBSERVERS> {
        // at most six channels, the index always fits
        self.sonar.armed().arm(direction.index() as u8);
        self.state = SchedulerState::Armed(direction);

        let now = self.clock.now();
        let echoes = &mut self.echoes;
        self.sonar.with(|array| {
            while let Some(sample) = echoes.dequeue() {
                if !array.ingest(sample) {
                    trace!("echo for channel {} not admitted", sample.channel);
                }
            }
        });

        self.state = SchedulerState::Settling(direction);
        let raised = self.sonar.with(|array| array.refresh(direction, now));
        self.state = SchedulerState::Evaluated(direction);
        raised
    }

    fn advance(&mut self) {
        let (sensors, measurements) = self
            .sonar
            .with(|array| (array.sensors(), array.measurements()));
        self.round = self.round.saturating_add(1);
        if usize::from(self.round) >= measurements {
            self.round = 0;
            self.current = Direction::from_index((self.current.index() + 1) % sensors.max(1))
                .unwrap_or(Direction::Front);
        }
    }

    async fn shutdown(&mut self) {
        self.sonar.armed().disarm();
        if let Err(e) = self.trigger.reset().await {
            warn!("failed to reset triggers: {:?}", e);
        }
        self.state = SchedulerState::Idle;
        info!("sonar scheduler stopped");
    }
}
