//! Outbound byte queue between callers and the outbound pump.
//!
//! FIFO, unbounded, never blocks the sender. Shutdown is an explicit message
//! rather than an empty buffer, so an empty payload can never be mistaken for
//! it.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

enum Outbound {
    Data(Vec<u8>),
    Shutdown,
}

/// Result of a timed dequeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dequeued {
    /// Next buffer to write
    Item(Vec<u8>),
    /// Stop the pump
    Shutdown,
    /// Nothing arrived within the timeout
    TimedOut,
}

/// Create a connected sender/receiver pair.
pub fn outbound_queue() -> (OutboundSender, OutboundReceiver) {
    let (tx, rx) = mpsc::channel();
    (OutboundSender { tx }, OutboundReceiver { rx })
}

/// Producer side, shared by every thread that sends.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: Sender<Outbound>,
}

impl OutboundSender {
    /// Queue a buffer. Returns false once the receiver is gone.
    pub fn enqueue(&self, data: Vec<u8>) -> bool {
        self.tx.send(Outbound::Data(data)).is_ok()
    }

    /// Queue the shutdown sentinel.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Outbound::Shutdown);
    }
}

/// Consumer side, owned by the outbound pump.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: Receiver<Outbound>,
}

impl OutboundReceiver {
    /// Wait at most `timeout` for the next message.
    ///
    /// A queue whose senders are all gone reads as `Shutdown`.
    pub fn dequeue(&self, timeout: Duration) -> Dequeued {
        match self.rx.recv_timeout(timeout) {
            Ok(Outbound::Data(data)) => Dequeued::Item(data),
            Ok(Outbound::Shutdown) | Err(RecvTimeoutError::Disconnected) => Dequeued::Shutdown,
            Err(RecvTimeoutError::Timeout) => Dequeued::TimedOut,
        }
    }
}
