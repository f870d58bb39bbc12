//! # sshterm-core
//!
//! Core types for the sshterm client.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other sshterm crates. It provides:
//!
//! - Error taxonomy shared by every layer
//! - Client configuration (YAML)
//! - Colors, rendering attributes and styled runs
//! - Terminal dimensions
//! - Key types for input forwarding
//! - Session identifiers, states and connection credentials
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other sshterm crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod credentials;
pub mod error;
pub mod geometry;
pub mod key;
pub mod session;
pub mod style;

// Re-export commonly used types
pub use config::{
    ClientConfig, ConnectionSettings, LoggingSettings, SessionSettings, TerminalSettings,
};
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use geometry::Dimensions;
pub use key::Key;
pub use session::{SessionEvent, SessionId, SessionState};
pub use style::{Attributes, Color, ControlDirective, Segment, StyledRun};
