//! # sshterm
//!
//! Interactive terminal client for remote shell sessions.
//!
//! ## Architecture
//!
//! This is Layer 3 - the client binary's library half, tying together:
//! - sshterm-core: Core types and configuration
//! - sshterm-stream: Output interpreter and the PTY-backed channel
//! - sshterm-session: Session I/O engine
//!
//! It adds the command line, file logging, keyboard mapping and the
//! renderer that draws interpreted output on the local terminal.

pub mod app;
pub mod cli;
pub mod input;
pub mod logging;
pub mod render;

// Re-export commonly used types
pub use app::{event_loop, run, Outcome};
pub use cli::Cli;
pub use input::key_from_event;
pub use render::Renderer;
