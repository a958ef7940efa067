// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Connection parameters.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use scenelink_proto::wire::DEFAULT_MAX_PAYLOAD;
use url::{form_urlencoded, Url};

use crate::SessionError;

/// Endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "tcp://127.0.0.1:7420";

/// Where the controller listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `tcp://host:port`
    Tcp {
        /// Host name or address (IPv6 in brackets).
        host: String,
        /// Port.
        port: u16,
    },
    /// `unix:///path/to/socket`
    Unix(PathBuf),
}

impl FromStr for Endpoint {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = |reason: &str| SessionError::Endpoint {
            input: s.to_owned(),
            reason: reason.to_owned(),
        };
        let url = Url::parse(s).map_err(|e| bad(&e.to_string()))?;
        match url.scheme() {
            "tcp" => {
                let host = url.host_str().ok_or_else(|| bad("missing host"))?;
                let port = url.port().ok_or_else(|| bad("missing port"))?;
                Ok(Endpoint::Tcp {
                    host: host.to_owned(),
                    port,
                })
            }
            "unix" => {
                if url.path().is_empty() || url.path() == "/" {
                    return Err(bad("missing socket path"));
                }
                Ok(Endpoint::Unix(PathBuf::from(url.path())))
            }
            other => Err(bad(&format!("unsupported scheme `{other}`"))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::Tcp {
            host: "127.0.0.1".into(),
            port: 7420,
        }
    }
}

/// Session settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Controller address.
    pub endpoint: Endpoint,
    /// Consecutive failed connection attempts before the session parks.
    pub reconnect_attempts: u32,
    /// Delay before each automatic reconnection attempt.
    pub reconnect_interval: Duration,
    /// Largest accepted inbound payload.
    pub max_frame_bytes: usize,
    /// Uplink events buffered for the writer; overflow is dropped.
    pub outbound_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            reconnect_attempts: 3,
            reconnect_interval: Duration::from_millis(3000),
            max_frame_bytes: DEFAULT_MAX_PAYLOAD,
            outbound_capacity: 256,
        }
    }
}

impl SessionConfig {
    /// Defaults pointed at `endpoint`.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Override the attempt budget.
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Override the retry delay.
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Override the inbound payload cap.
    pub fn with_max_frame_bytes(mut self, max: usize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    /// Apply deployment query parameters on top of `self`.
    ///
    /// Recognised keys: `ws` (or `endpoint`), `reconnect_attempts`,
    /// `reconnect_interval` (milliseconds). A leading `?` is ignored, unknown
    /// keys are skipped.
    pub fn from_query(mut self, query: &str) -> Result<Self, SessionError> {
        let query = query.strip_prefix('?').unwrap_or(query);
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            let invalid = || SessionError::Query {
                name: name.to_string(),
                value: value.to_string(),
            };
            match name.as_ref() {
                "ws" | "endpoint" => self.endpoint = value.parse()?,
                "reconnect_attempts" => {
                    self.reconnect_attempts = value.parse().map_err(|_| invalid())?;
                }
                "reconnect_interval" => {
                    let ms: u64 = value.parse().map_err(|_| invalid())?;
                    self.reconnect_interval = Duration::from_millis(ms);
                }
                _ => {}
            }
        }
        Ok(self)
    }
}
