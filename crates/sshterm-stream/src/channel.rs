//! Byte channel capability.
//!
//! A [`Connector`] opens an authenticated [`Channel`] to a remote host. Asking
//! the channel for a shell splits it into three halves so that each can be
//! moved to the thread that uses it:
//!
//! - [`ShellReader`]: timed reads and exit status, owned by the inbound pump
//! - [`ShellWriter`]: synchronous writes, owned by the outbound pump
//! - [`ShellControl`]: resize and close, shared by the session engine

use std::time::Duration;

use sshterm_core::{Credentials, Dimensions, Result};

/// Parameters of a pseudo-terminal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    /// Terminal type advertised to the remote end (e.g. "xterm")
    pub term: String,
    /// Initial window size
    pub dimensions: Dimensions,
}

impl PtyRequest {
    /// Create a request.
    pub fn new(term: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            term: term.into(),
            dimensions,
        }
    }
}

/// Opens channels from credentials.
pub trait Connector: Send {
    /// Open a channel.
    ///
    /// Fails with `Error::Auth` when the credentials cannot be used and with
    /// `Error::Transport` when the remote end cannot be reached.
    fn open(&self, credentials: &Credentials) -> Result<Box<dyn Channel>>;
}

/// An open channel that has not started a shell yet.
pub trait Channel: Send {
    /// Request a pseudo-terminal shell.
    ///
    /// Fails with `Error::SessionStart`; on failure the channel stays usable
    /// and the request may be repeated.
    fn request_shell(&mut self, request: &PtyRequest) -> Result<ShellHandle>;
}

/// Read half of a running shell.
pub trait ShellReader: Send {
    /// Read whatever is available, waiting at most `timeout`.
    ///
    /// Returns 0 when nothing arrived in time. Errors are fatal for the
    /// session.
    fn read_available(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Whether the remote process has exited and its output is drained.
    fn exit_status_ready(&mut self) -> bool;

    /// Exit code of the remote process. Only meaningful once
    /// [`exit_status_ready`](Self::exit_status_ready) returned true.
    fn exit_status(&mut self) -> Result<i32>;
}

/// Write half of a running shell.
pub trait ShellWriter: Send {
    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<()>;
}

/// Control half of a running shell.
pub trait ShellControl: Send + Sync {
    /// Tell the remote end the window size changed.
    fn resize(&self, dimensions: Dimensions) -> Result<()>;

    /// Release the channel. Safe to call more than once.
    fn close(&self);
}

/// The three halves of a running shell.
pub struct ShellHandle {
    /// Inbound half
    pub reader: Box<dyn ShellReader>,
    /// Outbound half
    pub writer: Box<dyn ShellWriter>,
    /// Resize/close half
    pub control: Box<dyn ShellControl>,
}

impl std::fmt::Debug for ShellHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellHandle").finish_non_exhaustive()
    }
}
