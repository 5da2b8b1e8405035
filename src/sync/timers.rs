//! Keyed one-shot timers owned by a feature view.

use std::time::Duration;

use hashbrown::HashMap;
use tokio::{sync::mpsc, task::JoinHandle};

/// Transient timers (flower animation, message expiry and the like).
///
/// Each key has at most one pending timer; rescheduling a key restarts it.
/// Dropping the set aborts everything still pending, so no expiry fires
/// into a torn-down view.
#[derive(Debug)]
pub struct TransientTimers {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
    pending: HashMap<String, JoinHandle<()>>,
}

impl TransientTimers {
    /// Empty timer set. Must be created inside a tokio runtime before
    /// anything is scheduled.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            pending: HashMap::new(),
        }
    }

    /// Starts (or restarts) the timer for `key`.
    pub fn schedule(&mut self, key: impl Into<String>, after: Duration) {
        let key = key.into();
        if let Some(old) = self.pending.remove(&key) {
            old.abort();
        }
        let tx = self.tx.clone();
        let fired = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(fired);
        });
        self.pending.insert(key, handle);
    }

    /// Cancels the timer for `key`. Returns false if none was pending.
    pub fn cancel(&mut self, key: &str) -> bool {
        match self.pending.remove(key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancels every pending timer and forgets expiries not yet observed.
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
        while self.rx.try_recv().is_ok() {}
    }

    /// True while `key` has not fired or been cancelled.
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Waits for the next expiry and returns its key. Pends forever while
    /// nothing is scheduled.
    pub async fn expired(&mut self) -> String {
        loop {
            // `self.tx` keeps the channel open, so `recv` never yields `None`.
            if let Some(key) = self.rx.recv().await {
                if self.pending.remove(&key).is_some() {
                    return key;
                }
                // Stale expiry from a timer that was restarted meanwhile.
            }
        }
    }
}

impl Default for TransientTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TransientTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_key_and_restart_replaces() {
        let mut timers = TransientTimers::new();
        timers.schedule("flower", Duration::from_millis(100));
        timers.schedule("flower", Duration::from_millis(300));
        timers.schedule("toast", Duration::from_millis(200));
        assert_eq!(timers.len(), 2);

        assert_eq!(timers.expired().await, "toast");
        assert_eq!(timers.expired().await, "flower");
        assert!(timers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timers_never_fire() {
        let mut timers = TransientTimers::new();
        timers.schedule("a", Duration::from_millis(50));
        timers.schedule("b", Duration::from_millis(60));
        assert!(timers.cancel("a"));
        assert!(!timers.cancel("a"));
        timers.cancel_all();

        let waited = tokio::time::timeout(Duration::from_secs(1), timers.expired()).await;
        assert!(waited.is_err());
    }
}
