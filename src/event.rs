use tokio::sync::mpsc;

use crate::error::SyncError;

/// Events published by the background poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
  /// A poll cycle merged this many posts newer than the previous high-water mark
  NewPosts { count: usize },
  /// A poll cycle failed; the poller carries on with the next cycle
  PollFailed(SyncError),
}

/// Receiving half of the poller's event channel
pub struct SyncEvents {
  rx: mpsc::UnboundedReceiver<SyncEvent>,
}

impl SyncEvents {
  /// Receive the next event
  pub async fn next(&mut self) -> Option<SyncEvent> {
    self.rx.recv().await
  }
}

/// Create a connected sender/receiver pair for poller events.
pub fn channel() -> (mpsc::UnboundedSender<SyncEvent>, SyncEvents) {
  let (tx, rx) = mpsc::unbounded_channel();
  (tx, SyncEvents { rx })
}
