//! Progress event fan-out.
//!
//! Events flow through a bounded broadcast ring per investigation. A slow
//! subscriber lags instead of backing up the pipeline; skipped events
//! surface as a drop counter on the next event the subscriber receives.

use crate::types::ProgressEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ProgressEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(8));
        Self { sender }
    }

    /// Publish an event. Delivery is best effort: no subscriber, no work.
    pub fn publish(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream {
            inner: self.sender.subscribe(),
            pending_dropped: 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A subscriber's view of the event ring.
pub struct EventStream {
    inner: broadcast::Receiver<ProgressEvent>,
    pending_dropped: u64,
}

impl EventStream {
    /// Next event, or `None` once the investigation's bus closes. Events
    /// skipped while lagging are counted onto the next delivery.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.inner.recv().await {
                Ok(mut event) => {
                    event.dropped_events += std::mem::take(&mut self.pending_dropped);
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.pending_dropped += skipped;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
