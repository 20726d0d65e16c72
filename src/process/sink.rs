//! Ordered hand-off from the reader task to a polling consumer.

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::protocol::Event;

/// Default interval between consumer drains.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Producer half of the event sink, owned by the reader task.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: UnboundedSender<Event>,
}

impl EventSender {
    /// Queue an event. Returns false if the consumer is gone.
    pub fn send(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Consumer half of the event sink.
///
/// Events come out in exactly the order they went in. The queue is
/// unbounded; worker output is paced by the network, not the CPU.
#[derive(Debug)]
pub struct EventSink {
    rx: UnboundedReceiver<Event>,
    closed: bool,
}

impl EventSink {
    /// Create a connected sender/sink pair.
    #[must_use]
    pub fn channel() -> (EventSender, EventSink) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EventSender { tx }, EventSink { rx, closed: false })
    }

    /// Take everything currently queued without waiting.
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        events
    }

    /// Wait up to `interval` for the first event, then drain the rest.
    ///
    /// Returns an empty batch if nothing arrived in time or the sink closed.
    pub async fn next_batch(&mut self, interval: Duration) -> Vec<Event> {
        if self.closed {
            return Vec::new();
        }
        match tokio::time::timeout(interval, self.rx.recv()).await {
            Ok(Some(first)) => {
                let mut events = vec![first];
                events.extend(self.drain());
                events
            }
            Ok(None) => {
                self.closed = true;
                Vec::new()
            }
            Err(_) => Vec::new(),
        }
    }

    /// Returns true once every sender is gone and the queue has been emptied.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
