//! Scan scheduler
//!
//! Owns the single pending capture timer. Arming again replaces the
//! pending timer, so there is never more than one scheduled scan.

use crate::settings::ScanSettings;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// One-shot, re-armable capture timer
pub struct ScanScheduler {
    pending: Mutex<Option<JoinHandle<()>>>,
    settings: watch::Receiver<ScanSettings>,
}

impl ScanScheduler {
    /// Create a scheduler that takes its interval from `settings`
    pub fn new(settings: watch::Receiver<ScanSettings>) -> Self {
        Self {
            pending: Mutex::new(None),
            settings,
        }
    }

    /// Arm a one-shot timer, cancelling any timer already pending
    ///
    /// `delay` is clamped up to [`crate::settings::MIN_SCAN_INTERVAL`].
    /// `on_fire` runs on the timer task once the delay has elapsed; it
    /// should hand longer work off to its own task. Must be called from
    /// within a Tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = delay.max(crate::settings::MIN_SCAN_INTERVAL);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        });

        let previous = self.pending.lock().replace(timer);
        if let Some(previous) = previous {
            previous.abort();
        }
        debug!(delay_ms = delay.as_millis() as u64, "Scan armed");
    }

    /// Arm using the interval configured right now
    pub fn schedule_next<F>(&self, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = self.settings.borrow().scan_delay();
        self.schedule(delay, on_fire);
    }

    /// Cancel the pending timer, if any
    ///
    /// Returns true when a timer that had not yet fired was cancelled.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(timer) => {
                let was_pending = !timer.is_finished();
                timer.abort();
                if was_pending {
                    debug!("Pending scan cancelled");
                }
                was_pending
            }
            None => false,
        }
    }

    /// True while a timer is armed and has not fired
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

impl Drop for ScanScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.pending.get_mut().take() {
            timer.abort();
        }
    }
}
