//! Process-wide shutdown signal.
//!
//! [`channel`] hands out one [`ShutdownTrigger`] (held by `main`) and a
//! cloneable [`Shutdown`] listener that the scheduler and every in-flight
//! fetch select against.

use tokio::sync::watch;

/// Fires the shutdown signal. Dropping it without firing leaves listeners
/// waiting forever.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // send_replace succeeds even when every listener is gone
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    /// A listener that never fires, for one-shot callers
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the trigger has fired.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        let fired = rx.wait_for(|fired| *fired).await.is_ok();
        if !fired {
            // Trigger dropped without firing
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_resolves_after_trigger() {
        let (trigger, shutdown) = channel();
        assert!(!shutdown.is_triggered());

        let listener = shutdown.clone();
        let handle = tokio::spawn(async move { listener.wait().await });

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener should wake")
            .unwrap();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns_immediately() {
        let (trigger, shutdown) = channel();
        trigger.trigger();
        tokio::time::timeout(Duration::from_millis(100), shutdown.wait())
            .await
            .expect("already-fired signal should not block");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trigger_never_fires() {
        let (trigger, shutdown) = channel();
        drop(trigger);
        let result = tokio::time::timeout(Duration::from_secs(60), shutdown.wait()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_stays_pending() {
        let shutdown = Shutdown::never();
        let result = tokio::time::timeout(Duration::from_secs(60), shutdown.wait()).await;
        assert!(result.is_err());
        assert!(!shutdown.is_triggered());
    }
}
