//! Cancellable one-second ticker driving a session's countdown.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Default tick period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// A tick emitted for the run identified by `generation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
}

/// Handle to a running ticker task.
///
/// The task stops when the handle is cancelled or dropped, or when the
/// receiving side of the tick channel goes away.
#[derive(Debug)]
pub struct Countdown {
    generation: u64,
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Spawn a ticker sending a [`Tick`] every `period`, starting one period from now.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(period: Duration, generation: u64, ticks: mpsc::Sender<Tick>) -> Self {
        let period = period.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if ticks.send(Tick { generation }).await.is_err() {
                    break;
                }
            }
        });
        Self { generation, handle }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
