// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Socket session bridging [`SceneChannels`](scenelink_proto::SceneChannels)
//! to a remote controller.
//!
//! One background task owns the socket. Every uplink event is forwarded to
//! the wire while connected; every inbound frame is published on the
//! downlink store. Connection loss is recovered by a bounded reconnection
//! loop whose progress is exposed as a [`SessionStatus`] watch.

mod config;
mod connector;
mod error;
mod reader;
mod session;
mod status;

pub use config::{Endpoint, SessionConfig, DEFAULT_ENDPOINT};
pub use connector::{AsyncStream, ConnectFuture, Connector, SocketConnector, Transport};
pub use error::SessionError;
pub use reader::read_frame;
pub use session::{Session, SessionHandle};
pub use status::{SessionState, SessionStatus};
