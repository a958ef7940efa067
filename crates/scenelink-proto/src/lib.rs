// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session wire schema for scenelink: uplink/downlink events, the binary
//! framing they travel in, and decoding of downlink tree patches.
//!
//! Payloads are schemaless at this layer ([`Value`]); each event type gives
//! them meaning at the point of use.

pub use scenelink_tree::{Child, ChildAttr, Node, Props, SceneTree, TreePatch, Value};

mod patch;
pub mod value;
pub mod wire;

pub use patch::PatchError;

use scenelink_bus::{BusEvent, Channels};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Event type names used on the wire.
///
/// The lists are not exhaustive: any non-empty string is a valid etype, these
/// are the ones the core and built-in components know about.
pub mod etype {
    /// Client → server, sent once on every socket open (no payload).
    pub const INIT: &str = "INIT";
    /// Pointer click on a node.
    pub const CLICK: &str = "CLICK";
    /// Control value changed.
    pub const INPUT: &str = "INPUT";
    /// Text submitted.
    pub const SUBMIT: &str = "SUBMIT";
    /// File uploaded (bytes payload).
    pub const UPLOAD: &str = "UPLOAD";
    /// Object dragged.
    pub const OBJECT_MOVE: &str = "OBJECT_MOVE";
    /// Object drag released.
    pub const OBJECT_MOVE_END: &str = "OBJECT_MOVE_END";
    /// Camera pose changed.
    pub const CAMERA_MOVE: &str = "CAMERA_MOVE";
    /// Rendered snapshot returned to the server.
    pub const SNAPSHOT: &str = "SNAPSHOT";
    /// Gamepad state.
    pub const GAMEPAD: &str = "GAMEPAD";
    /// Hand pose.
    pub const HAND_MOVE: &str = "HAND_MOVE";

    /// Server → client: replace the whole tree.
    pub const SET: &str = "SET";
    /// Server → client: append nodes.
    pub const ADD: &str = "ADD";
    /// Server → client: merge nodes by key anywhere.
    pub const UPDATE: &str = "UPDATE";
    /// Server → client: merge-or-append nodes under a parent.
    pub const UPSERT: &str = "UPSERT";
    /// Server → client: remove nodes by key.
    pub const REMOVE: &str = "REMOVE";

    /// Downlink etypes that edit the scene tree.
    pub const TREE_EDITS: [&str; 5] = [SET, ADD, UPDATE, UPSERT, REMOVE];
}

fn null() -> Value {
    Value::Null
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Client-originated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UplinkEvent {
    /// Event type discriminator.
    pub etype: String,
    /// Originating node, absent for global events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Payload, shaped per etype.
    #[serde(default = "null")]
    pub value: Value,
    /// Client wall clock at creation (ms since the Unix epoch).
    #[serde(default)]
    pub ts: u64,
}

impl UplinkEvent {
    /// Event with no key and a null payload, stamped with the current time.
    pub fn new(etype: impl Into<String>) -> Self {
        Self {
            etype: etype.into(),
            key: None,
            value: Value::Null,
            ts: now_millis(),
        }
    }

    /// The session-start event sent on every socket open.
    pub fn session_start() -> Self {
        Self::new(etype::INIT)
    }

    /// Set the originating key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the payload.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }
}

impl BusEvent for UplinkEvent {
    fn etype(&self) -> &str {
        &self.etype
    }
}

/// Server-originated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownlinkEvent {
    /// Event type discriminator.
    pub etype: String,
    /// Target node, absent for global events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Payload, shaped per etype.
    #[serde(default = "null")]
    pub data: Value,
}

impl DownlinkEvent {
    /// Event with no key and a null payload.
    pub fn new(etype: impl Into<String>) -> Self {
        Self {
            etype: etype.into(),
            key: None,
            data: Value::Null,
        }
    }

    /// Set the target key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the payload.
    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    /// Whether this event edits the scene tree.
    pub fn is_tree_edit(&self) -> bool {
        etype::TREE_EDITS.contains(&self.etype.as_str())
    }
}

impl BusEvent for DownlinkEvent {
    fn etype(&self) -> &str {
        &self.etype
    }
}

/// Uplink/downlink store pair for one session.
pub type SceneChannels = Channels<UplinkEvent, DownlinkEvent>;

/// Fresh [`SceneChannels`].
pub fn scene_channels() -> SceneChannels {
    Channels::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_start_has_no_payload() {
        let e = UplinkEvent::session_start();
        assert_eq!(e.etype, etype::INIT);
        assert!(e.key.is_none());
        assert!(e.value.is_null());
        assert!(e.ts > 0);
    }

    #[test]
    fn tree_edit_classification() {
        assert!(DownlinkEvent::new(etype::UPSERT).is_tree_edit());
        assert!(!DownlinkEvent::new("FRAME").is_tree_edit());
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let v = Value::Map(vec![("etype".into(), "PING".into())]);
        let e: DownlinkEvent = v.deserialized().unwrap();
        assert_eq!(e, DownlinkEvent::new("PING"));
    }
}
