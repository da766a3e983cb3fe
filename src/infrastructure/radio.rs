//! Radio State Monitor
//!
//! Observes the platform Bluetooth adapter's power state. Platform glue owns
//! the sending half and pushes ON/OFF/transitional changes; the bridge reads
//! the current value synchronously and awaits changes in its run loop.

use tokio::sync::watch;

use crate::domain::models::RadioState;

/// Receiving half of the radio state feed.
pub struct RadioMonitor {
    rx: watch::Receiver<RadioState>,
}

/// Create a radio feed seeded with `initial`. The returned sender belongs to
/// platform glue (or a test); dropping it ends the feed.
pub fn radio_channel(initial: RadioState) -> (watch::Sender<RadioState>, RadioMonitor) {
    let (tx, rx) = watch::channel(initial);
    (tx, RadioMonitor { rx })
}

impl RadioMonitor {
    pub fn current(&self) -> RadioState {
        *self.rx.borrow()
    }

    /// Wait for the next state change. Returns `None` once the platform side
    /// has dropped the sender.
    pub async fn changed(&mut self) -> Option<RadioState> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
