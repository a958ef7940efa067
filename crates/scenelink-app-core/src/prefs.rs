// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Saved client preferences (connection parameters + log filter).

use serde::{Deserialize, Serialize};

/// Config key the client preferences are stored under.
pub const PREFS_KEY: &str = "client";

/// Saved preferences for a scenelink client.
///
/// Missing fields fall back to their defaults, so older files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientPrefs {
    /// Controller endpoint (`tcp://host:port` or `unix:///path`).
    pub endpoint: String,
    /// Consecutive failed connection attempts before giving up.
    pub reconnect_attempts: u32,
    /// Delay between automatic attempts, in milliseconds.
    pub reconnect_interval_ms: u64,
    /// Largest accepted inbound payload, in bytes.
    pub max_frame_bytes: usize,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ClientPrefs {
    fn default() -> Self {
        Self {
            endpoint: "tcp://127.0.0.1:7420".to_owned(),
            reconnect_attempts: 3,
            reconnect_interval_ms: 3000,
            max_frame_bytes: 8 * 1024 * 1024,
            log_filter: "info".to_owned(),
        }
    }
}
