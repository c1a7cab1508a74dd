//! Fire-and-forget delivery of monitoring events.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::domain::models::SwarmEvent;

/// Sender half of a bounded event channel. A disabled sink drops everything.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    sender: Option<mpsc::Sender<SwarmEvent>>,
}

impl EventSink {
    /// Create a sink and the receiver that drains it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SwarmEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { sender: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Never blocks. A full or closed channel drops the event.
    pub fn emit(&self, event: SwarmEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!(?event, "Event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Event channel closed, dropping event");
            }
        }
    }
}
