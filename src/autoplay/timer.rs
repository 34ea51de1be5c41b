//! Cancellable slide timer
//!
//! Non-verse slides wait a fixed delay before autoplay advances. Each arm
//! bumps a generation counter so a firing from an earlier arm is rejected
//! even if it was already queued when the timer was cancelled.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Sent when an armed timer elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub generation: u64,
}

pub struct SlideTimer {
    delay: Duration,
    generation: u64,
    armed: Option<CancellationToken>,
    tx: mpsc::UnboundedSender<TimerFired>,
}

impl SlideTimer {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                generation: 0,
                armed: None,
                tx,
            },
            rx,
        )
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Start (or restart) the countdown
    pub fn arm(&mut self) {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let delay = self.delay;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(TimerFired { generation });
                }
            }
        });

        tracing::debug!("Slide timer armed for {:?} (generation {})", delay, generation);
        self.armed = Some(token);
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.armed.take() {
            token.cancel();
            tracing::debug!("Slide timer cancelled (generation {})", self.generation);
        }
    }

    /// Consume a firing; false if it belongs to a cancelled or replaced arm
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        if self.armed.is_some() && fired.generation == self.generation {
            self.armed = None;
            true
        } else {
            tracing::debug!("Ignoring stale slide timer (generation {})", fired.generation);
            false
        }
    }
}
