//! # sshterm-session
//!
//! Session I/O engine for the sshterm client.
//!
//! This crate provides:
//! - The session lifecycle (start, send, resize, close)
//! - Inbound and outbound pumps on dedicated threads
//! - The outbound FIFO queue and ordered event delivery
//! - A scripted in-memory channel for tests
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on sshterm-core and
//! sshterm-stream and drives a channel on behalf of the presentation layer.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod events;
pub mod queue;
pub mod session;
pub mod testing;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Re-export commonly used types
pub use events::SessionEvents;
pub use queue::{outbound_queue, Dequeued, OutboundReceiver, OutboundSender};
pub use session::Session;

/// Lock a mutex, carrying on with the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
