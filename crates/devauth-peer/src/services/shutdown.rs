// ============================================
// File: crates/devauth-peer/src/services/shutdown.rs
// ============================================
//! # Shutdown Signal
//!
//! ## Creation Reason
//! Every long-running operation (authentication wait, responder loop,
//! channel listener) must stop promptly when the process is told to quit.
//!
//! ## Main Functionality
//! - `ShutdownSignal`: Cloneable trigger shared by the whole peer
//! - `ShutdownListener`: Awaitable handle used inside `tokio::select!`
//!
//! ## ⚠️ Important Note for Next Developer
//! - The flag is checked before awaiting the broadcast, so a listener
//!   created AFTER `trigger()` still observes the shutdown.
//! - A lagged receiver counts as shutdown. A closed one (every
//!   `ShutdownSignal` dropped) never completes: nothing can fire it anymore.
//!
//! ## Last Modified
//! v0.1.0 - Initial shutdown signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};

/// Process-wide shutdown trigger.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    tx: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Fires the signal. Calling it again is a no-op.
    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    /// Returns `true` once `trigger` has been called.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns a listener for this signal.
    #[must_use]
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            flag: Arc::clone(&self.flag),
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`ShutdownSignal`].
#[derive(Debug)]
pub struct ShutdownListener {
    flag: Arc<AtomicBool>,
    rx: broadcast::Receiver<()>,
}

impl ShutdownListener {
    /// Completes once shutdown has been requested.
    ///
    /// Cancel-safe.
    pub async fn recv(&mut self) {
        if self.flag.load(Ordering::SeqCst) {
            return;
        }
        match self.rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => std::future::pending::<()>().await,
        }
    }

    /// Returns `true` once shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listener_wakes_on_trigger() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.subscribe();

        let waiter = tokio::spawn(async move { listener.recv().await });
        signal.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("listener did not wake")
            .unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_late_listener_sees_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.trigger();

        let mut late = signal.subscribe();
        assert!(late.is_triggered());
        tokio::time::timeout(Duration::from_millis(100), late.recv())
            .await
            .expect("late listener blocked");
    }

    #[tokio::test(start_paused = true)]
    async fn test_untriggered_listener_pends() {
        let signal = ShutdownSignal::new();
        let mut listener = signal.subscribe();
        let result = tokio::time::timeout(Duration::from_secs(5), listener.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_signal_never_fires() {
        let mut listener = ShutdownSignal::new().subscribe();
        let result = tokio::time::timeout(Duration::from_secs(60), listener.recv()).await;
        assert!(result.is_err());
        assert!(!listener.is_triggered());
    }
}
