// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use scenelink_proto::wire::WireError;
use thiserror::Error;

/// Session-level failure.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Endpoint string could not be used.
    #[error("invalid endpoint `{input}`: {reason}")]
    Endpoint {
        /// Offending input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },
    /// Query parameter with an unusable value.
    #[error("invalid value `{value}` for `{name}`")]
    Query {
        /// Parameter name.
        name: String,
        /// Offending value.
        value: String,
    },
    /// Socket failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Framing or codec failure.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// The session task is gone.
    #[error("session task stopped")]
    Closed,
}
