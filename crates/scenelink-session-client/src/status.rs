// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Connection state published by the session task.

use std::fmt;

/// Where the session is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No socket and no attempt in flight.
    Disconnected,
    /// Connection attempt in flight.
    Connecting,
    /// Socket open; uplink events are forwarded.
    Connected,
    /// The last attempt or connection failed. A live connection that fails
    /// moves on to `Disconnected` before the retry is armed.
    Errored,
    /// Waiting out the retry interval.
    Reconnecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Errored => "error",
            SessionState::Reconnecting => "reconnecting",
        })
    }
}

/// Snapshot of the session for status indicators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current state.
    pub state: SessionState,
    /// Consecutive failed connection attempts since the last success or
    /// manual reconnect.
    pub failed_attempts: u32,
    /// The attempt budget is spent; nothing happens until `reconnect()`.
    pub exhausted: bool,
    /// Most recent transport error, if any.
    pub last_error: Option<String>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Disconnected,
            failed_attempts: 0,
            exhausted: false,
            last_error: None,
        }
    }
}

impl SessionStatus {
    /// Whether uplink traffic currently reaches the wire.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Short human-readable label.
    pub fn label(&self) -> String {
        match self.state {
            SessionState::Disconnected if self.exhausted => {
                format!("disconnected after {} failed attempts", self.failed_attempts)
            }
            SessionState::Reconnecting => {
                format!("reconnecting ({} failed)", self.failed_attempts)
            }
            SessionState::Errored => match &self.last_error {
                Some(err) => format!("error: {err}"),
                None => "error".to_owned(),
            },
            state => state.to_string(),
        }
    }
}
