//! UI-agnostic request state types
//!
//! These are the values a front end observes while a submission is in flight.
//! They don't depend on any specific UI framework.

use std::fmt;

/// Lifecycle of one submission cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Sending,
    Streaming,
    Settled,
    Failed(Failure),
}

impl StreamState {
    /// A request is outstanding; new submissions are rejected.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, StreamState::Sending | StreamState::Streaming)
    }

    /// Settled and Failed end a cycle but can start the next one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Settled | StreamState::Failed(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            StreamState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StreamState::Idle => "idle",
            StreamState::Sending => "sending",
            StreamState::Streaming => "streaming",
            StreamState::Settled => "settled",
            StreamState::Failed(_) => "failed",
        }
    }
}

/// Why a cycle ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request never produced a usable body.
    Transport,
    /// Reading or decoding failed after streaming began.
    Stream,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "Request cancelled")
    }

    pub fn timed_out(after: std::time::Duration) -> Self {
        let limit = if after.subsec_millis() == 0 {
            format!("{}s", after.as_secs())
        } else {
            format!("{}ms", after.as_millis())
        };
        Self::new(FailureKind::Timeout, format!("Request timed out after {}", limit))
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.message)
    }
}

/// What observers see after every transition or append.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Incremented for every accepted submission; 0 until the first one.
    pub cycle: u64,
    pub state: StreamState,
    /// The OutputBuffer: everything decoded so far in this cycle.
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_in_flight_states() {
        assert!(StreamState::Sending.is_in_flight());
        assert!(StreamState::Streaming.is_in_flight());
        assert!(!StreamState::Idle.is_in_flight());
        assert!(!StreamState::Settled.is_in_flight());
        assert!(!StreamState::Failed(Failure::cancelled()).is_in_flight());
    }

    #[test]
    fn test_terminal_states() {
        assert!(StreamState::Settled.is_terminal());
        assert!(StreamState::Failed(Failure::cancelled()).is_terminal());
        assert!(!StreamState::Idle.is_terminal());
        assert!(!StreamState::Streaming.is_terminal());
    }

    #[test]
    fn test_failure_display() {
        let failure = Failure::new(FailureKind::Transport, "connection refused");
        assert_eq!(failure.to_string(), "Error: connection refused");
    }

    #[test]
    fn test_timeout_is_distinguishable() {
        let failure = Failure::timed_out(Duration::from_secs(30));
        assert_eq!(failure.kind, FailureKind::Timeout);
        assert_eq!(failure.message, "Request timed out after 30s");
        assert_ne!(failure.kind, Failure::cancelled().kind);
    }

    #[test]
    fn test_sub_second_timeout_message() {
        let failure = Failure::timed_out(Duration::from_millis(50));
        assert_eq!(failure.message, "Request timed out after 50ms");
        let failure = Failure::timed_out(Duration::from_millis(1500));
        assert_eq!(failure.message, "Request timed out after 1500ms");
    }
}
