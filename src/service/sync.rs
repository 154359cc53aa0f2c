use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::sync::Notify;

/// Stop flag shared between the live feed and whoever owns it
///
/// `Notify::notify_waiters` only wakes tasks already parked in `notified()`,
/// so the flag is checked before and after every wait to catch a shutdown
/// requested while the feed was busy evaluating.
pub struct ShutdownSignal {
    notify: Notify,
    stopped: AtomicBool,
}

impl ShutdownSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            notify: Notify::new(),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn is_shutdown(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Sleep for `timeout` unless shutdown arrives first
    ///
    /// Returns `true` if shutdown was requested.
    pub async fn wait_timeout_or_shutdown(&self, timeout: Duration) -> bool {
        if self.is_shutdown() {
            return true;
        }

        tokio::select! {
            _ = self.notify.notified() => true,
            _ = tokio::time::sleep(timeout) => self.is_shutdown(),
        }
    }

    pub fn shutdown(&self) {
        self.stopped.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}
