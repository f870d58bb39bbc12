//! Session event delivery.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc as async_mpsc;
use tracing::{debug, warn};

use sshterm_core::{Segment, SessionEvent};

use crate::lock;

#[derive(Debug, Default)]
struct Gate {
    /// Set by `close()`: nothing is delivered anymore
    silenced: bool,
    /// A terminal event has been delivered
    finished: bool,
}

/// Sending side, shared by both pumps.
///
/// Delivery happens under the gate lock, so once [`silence`](Self::silence)
/// returns no event can slip through.
#[derive(Debug)]
pub(crate) struct EventEmitter {
    tx: Sender<SessionEvent>,
    gate: Mutex<Gate>,
}

impl EventEmitter {
    pub(crate) fn new() -> (Self, SessionEvents) {
        let (tx, rx) = mpsc::channel();
        let emitter = Self {
            tx,
            gate: Mutex::new(Gate::default()),
        };
        (emitter, SessionEvents { rx })
    }

    /// Deliver output. Dropped after a terminal event or after silencing.
    pub(crate) fn data(&self, segments: Vec<Segment>) -> bool {
        let gate = lock(&self.gate);
        if gate.silenced || gate.finished {
            return false;
        }
        self.tx.send(SessionEvent::DataArrived(segments)).is_ok()
    }

    /// Deliver the terminal event. Only the first one gets through.
    pub(crate) fn finish(&self, event: SessionEvent) -> bool {
        debug_assert!(event.is_terminal());
        let mut gate = lock(&self.gate);
        if gate.silenced || gate.finished {
            debug!("Suppressed terminal event: {:?}", event);
            return false;
        }
        gate.finished = true;
        self.tx.send(event).is_ok()
    }

    /// Stop all further delivery.
    pub(crate) fn silence(&self) {
        lock(&self.gate).silenced = true;
    }
}

/// Receiving side of a session's events.
///
/// Events arrive in order: any number of `DataArrived`, then at most one
/// `Closed` or `Error`. Once the session and its pumps are gone the stream
/// ends.
#[derive(Debug)]
pub struct SessionEvents {
    rx: Receiver<SessionEvent>,
}

impl SessionEvents {
    /// Block until the next event; None once the stream has ended.
    pub fn recv(&self) -> Option<SessionEvent> {
        self.rx.recv().ok()
    }

    /// Wait at most `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SessionEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Next event if one is already queued.
    pub fn try_recv(&self) -> Option<SessionEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Forward events into a tokio channel for async consumers.
    ///
    /// A helper thread moves events across and exits when either side is
    /// dropped.
    pub fn into_async(self) -> async_mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = async_mpsc::unbounded_channel();
        let spawned = thread::Builder::new()
            .name("sshterm-events".to_string())
            .spawn(move || {
                while let Ok(event) = self.rx.recv() {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                debug!("Event bridge finished");
            });
        if let Err(e) = spawned {
            // the receiver then reports a closed stream right away
            warn!("Failed to start event bridge: {}", e);
        }
        rx
    }
}
