//! # sshterm-stream
//!
//! Byte-stream layer of the sshterm client.
//!
//! This crate provides:
//! - The terminal stream interpreter (bytes to styled runs, no I/O)
//! - The byte channel capability traits consumed by the session engine
//! - A PTY-backed channel that runs the system ssh client or a local shell
//!
//! ## Architecture
//!
//! This is Layer 1 in the architecture - it depends on sshterm-core only.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod interpreter;
pub mod pty;

// Re-export commonly used types
pub use channel::{
    Channel, Connector, PtyRequest, ShellControl, ShellHandle, ShellReader, ShellWriter,
};
pub use interpreter::{coalesce, interpret, Interpreter, ParserState, SequencePolicy};
pub use pty::{Launch, PtyChannel, PtyConnector};
