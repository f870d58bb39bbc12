//! Session identifiers, lifecycle states and events.

use uuid::Uuid;

use crate::style::{plain_text, Segment};

/// Unique identifier for a remote shell session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Channel open, no shell requested yet
    Idle,
    /// Shell running, pumps active
    Running,
    /// Remote process exited with the given code
    Exited(i32),
    /// A channel failure ended the session
    Failed,
    /// Closed by the caller
    Closed,
}

impl SessionState {
    /// Whether the session can no longer be started.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            SessionState::Exited(_) | SessionState::Failed | SessionState::Closed
        )
    }
}

/// Event delivered from the session engine to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Output of one channel read, interpreted
    DataArrived(Vec<Segment>),
    /// Remote process exited
    Closed(i32),
    /// Channel failure; the session has stopped
    Error(String),
}

impl SessionEvent {
    /// Whether no events follow this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionEvent::DataArrived(_))
    }

    /// Plain text carried by a `DataArrived` event.
    pub fn text(&self) -> Option<String> {
        match self {
            SessionEvent::DataArrived(segments) => Some(plain_text(segments)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StyledRun;

    #[test]
    fn test_session_id_creation() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new();
        assert_eq!(format!("{id}").len(), 36);
    }

    #[test]
    fn test_finished_states() {
        assert!(!SessionState::Idle.is_finished());
        assert!(!SessionState::Running.is_finished());
        assert!(SessionState::Exited(0).is_finished());
        assert!(SessionState::Failed.is_finished());
        assert!(SessionState::Closed.is_finished());
    }

    #[test]
    fn test_event_helpers() {
        let data = SessionEvent::DataArrived(vec![Segment::Text(StyledRun::plain("hi"))]);
        assert!(!data.is_terminal());
        assert_eq!(data.text().as_deref(), Some("hi"));

        assert!(SessionEvent::Closed(0).is_terminal());
        assert!(SessionEvent::Error("boom".to_string()).is_terminal());
        assert_eq!(SessionEvent::Closed(3).text(), None);
    }
}
