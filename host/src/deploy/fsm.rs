//! Finite State Machine for a viewing session

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// FSM settings
#[derive(Debug, Clone)]
pub struct FsmSettings {
    /// Automatic retries after a failed attempt
    pub retry_count: u32,

    /// Base delay between retries
    pub retry_delay: Duration,
}

impl Default for FsmSettings {
    fn default() -> Self {
        Self {
            retry_count: 2,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No server, nothing in flight
    Idle,

    /// Enumerating remote files
    Listing,

    /// Writing files locally
    Materializing,

    /// Binding the local server
    Starting,

    /// Content is being served
    Ready,

    /// The last attempt failed
    Error,
}

/// Session event
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Start a session; literal content skips listing
    Begin { literal: bool },

    /// Remote files listed
    Listed,

    /// Files written
    Materialized,

    /// Server bound
    Started,

    /// Current step failed
    Failed(String),

    /// Replay from the top
    Retry { literal: bool },

    /// Stop the server and abandon the bridge
    Teardown,
}

/// Session FSM
#[derive(Debug, Clone)]
pub struct SessionFsm {
    state: SessionState,
    error: Option<String>,
    retry_count: u32,
}

impl SessionFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            error: None,
            retry_count: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Failed attempts since the last success
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: SessionEvent) -> Result<(), String> {
        let new_state = match (self.state, &event) {
            // From Idle
            (SessionState::Idle, SessionEvent::Begin { literal }) => {
                self.error = None;
                first_step(*literal)
            }
            (SessionState::Idle, SessionEvent::Teardown) => SessionState::Idle,

            // Pipeline steps
            (SessionState::Listing, SessionEvent::Listed) => SessionState::Materializing,
            (SessionState::Materializing, SessionEvent::Materialized) => SessionState::Starting,
            (SessionState::Starting, SessionEvent::Started) => {
                self.retry_count = 0;
                SessionState::Ready
            }
            (
                SessionState::Listing | SessionState::Materializing | SessionState::Starting,
                SessionEvent::Failed(err),
            ) => {
                self.error = Some(err.clone());
                self.retry_count += 1;
                SessionState::Error
            }

            // From Error
            (SessionState::Error, SessionEvent::Retry { literal }) => {
                self.error = None;
                first_step(*literal)
            }

            // Teardown is the only way back to Idle
            (_, SessionEvent::Teardown) => {
                self.error = None;
                self.retry_count = 0;
                SessionState::Idle
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!(
                    "Invalid transition: {:?} -> {:?}",
                    state, event
                ));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Check if the session can be retried
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.state == SessionState::Error && self.retry_count <= max_retries
    }
}

fn first_step(literal: bool) -> SessionState {
    if literal {
        SessionState::Materializing
    } else {
        SessionState::Listing
    }
}

impl Default for SessionFsm {
    fn default() -> Self {
        Self::new()
    }
}
