//! Cancellable timers keyed by a stable id
//!
//! Each arming gets a fresh generation. A fire notification is only honoured
//! if its generation is still the armed one, so a notification already
//! sitting in the queue when its timer was cancelled is recognised as stale.

use crate::state_machine::{Event, TimerKey};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct ArmedTimer {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
pub struct TimerTable {
    armed: HashMap<TimerKey, ArmedTimer>,
    next_generation: u64,
}

impl TimerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `timer`, replacing any running instance. Returns the generation
    /// the fire notification will carry.
    pub fn arm(&mut self, timer: TimerKey, delay: Duration, tx: mpsc::Sender<Event>) -> u64 {
        self.cancel(timer);

        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(Event::TimerFired { timer, generation }).await;
                }
            }
        });

        tracing::debug!(?timer, generation, delay_ms = delay.as_millis(), "Timer armed");
        self.armed.insert(timer, ArmedTimer { generation, cancel });
        generation
    }

    /// Cancel `timer` if armed. Returns whether anything was cancelled.
    pub fn cancel(&mut self, timer: TimerKey) -> bool {
        match self.armed.remove(&timer) {
            Some(armed) => {
                armed.cancel.cancel();
                tracing::debug!(?timer, generation = armed.generation, "Timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Consume a fire notification. Returns true if it belongs to the armed
    /// instance, which is then disarmed.
    pub fn fire(&mut self, timer: TimerKey, generation: u64) -> bool {
        match self.armed.get(&timer) {
            Some(armed) if armed.generation == generation => {
                self.armed.remove(&timer);
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn is_armed(&self, timer: TimerKey) -> bool {
        self.armed.contains_key(&timer)
    }

    pub fn cancel_all(&mut self) {
        for (_, armed) in self.armed.drain() {
            armed.cancel.cancel();
        }
    }
}

impl Drop for TimerTable {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
