//! One-shot start latch opened by the first viewer.

use std::sync::Arc;

use tokio::sync::watch;

/// A latch that starts closed and can be opened exactly once.
///
/// Clones share the same latch.
#[derive(Debug, Clone)]
pub struct StartGate {
    tx: Arc<watch::Sender<bool>>,
}

impl StartGate {
    /// Create a closed gate.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Open the gate. Returns `true` only for the call that opened it.
    pub fn open(&self) -> bool {
        self.tx.send_if_modified(|open| {
            if *open {
                false
            } else {
                *open = true;
                true
            }
        })
    }

    /// Whether the gate has been opened.
    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the gate opens. Returns immediately if already open.
    pub async fn wait(&self) -> bool {
        let mut rx = self.tx.subscribe();
        rx.wait_for(|open| *open).await.is_ok()
    }
}

impl Default for StartGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn opens_exactly_once() {
        let gate = StartGate::new();
        assert!(!gate.is_open());
        assert!(gate.open());
        assert!(!gate.open());
        assert!(gate.is_open());
    }

    #[test]
    fn clones_share_the_latch() {
        let gate = StartGate::new();
        let other = gate.clone();
        assert!(other.open());
        assert!(gate.is_open());
        assert!(!gate.open());
    }

    #[tokio::test]
    async fn wait_returns_once_opened() {
        let gate = StartGate::new();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        gate.open();
        let opened = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(opened);
    }

    #[tokio::test]
    async fn wait_on_open_gate_is_immediate() {
        let gate = StartGate::new();
        gate.open();
        assert!(gate.wait().await);
    }
}
