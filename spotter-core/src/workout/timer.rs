//! Cancellable once-per-second rest countdown.

use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub generation: u64,
    pub remaining: u32,
}

/// Sends exactly `seconds` ticks into the session loop, one per second.
///
/// Each start bumps the generation and cancels the previous countdown, so
/// the loop can discard any tick that was already in flight.
pub struct RestTimer {
    tx: mpsc::UnboundedSender<TimerTick>,
    generation: u64,
    token: Option<CancellationToken>,
}

impl RestTimer {
    pub fn new(tx: mpsc::UnboundedSender<TimerTick>) -> Self {
        Self {
            tx,
            generation: 0,
            token: None,
        }
    }

    pub fn start(&mut self, seconds: u32) -> u64 {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        self.token = Some(token.clone());

        let tx = self.tx.clone();
        tokio::spawn(async move {
            for remaining in (0..seconds).rev() {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("rest timer {} cancelled at {}s", generation, remaining + 1);
                        return;
                    }
                    _ = tokio::time::sleep(TICK) => {}
                }
                if tx.send(TimerTick { generation, remaining }).is_err() {
                    return;
                }
            }
            debug!("rest timer {} finished", generation);
        });

        debug!("rest timer {} started for {}s", generation, seconds);
        generation
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }

    /// True for ticks from the countdown that is still current.
    pub fn is_current(&self, tick: &TimerTick) -> bool {
        self.token.is_some() && tick.generation == self.generation
    }

    /// Forget the countdown once its last tick has been handled.
    pub fn finish(&mut self, tick: &TimerTick) {
        if self.is_current(tick) && tick.remaining == 0 {
            self.token = None;
        }
    }

    pub fn is_running(&self) -> bool {
        self.token.is_some()
    }
}

impl Drop for RestTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
