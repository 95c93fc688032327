//! Observer interface for run notifications.

use crate::models::RunEvent;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Receives run notifications, in the order the transitions happened.
///
/// `notify` is called from both the caller of `start`/`cancel` and the
/// background supervisor, so it must not block.
pub trait RunObserver: Send + Sync {
    fn notify(&self, event: RunEvent);
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: UnboundedSender<RunEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RunObserver for ChannelObserver {
    fn notify(&self, event: RunEvent) {
        if let Err(unsent) = self.tx.send(event) {
            debug!("[{}] Run observer channel closed, dropping event", unsent.0.run());
        }
    }
}
