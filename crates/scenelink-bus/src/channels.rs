// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Uplink/downlink store pair handed to everything that talks to the session.

use std::fmt;

use crate::{BusEvent, Store};

/// The two stores of one connection session.
///
/// * `uplink` carries client-originated events toward the remote controller.
///   The session taps it on the wildcard channel and forwards every event
///   to the wire.
/// * `downlink` carries server-originated events; the session is its only
///   publisher.
///
/// Pass this bundle explicitly (constructor argument or mount context); it is
/// cheap to clone and every clone shares the same registries.
pub struct Channels<U, D> {
    /// Client → server events.
    pub uplink: Store<U>,
    /// Server → client events.
    pub downlink: Store<D>,
}

impl<U: BusEvent, D: BusEvent> Channels<U, D> {
    /// Fresh, empty pair of stores.
    pub fn new() -> Self {
        Self {
            uplink: Store::named("uplink"),
            downlink: Store::named("downlink"),
        }
    }
}

impl<U: BusEvent, D: BusEvent> Default for Channels<U, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U, D> Clone for Channels<U, D> {
    fn clone(&self) -> Self {
        Self {
            uplink: self.uplink.clone(),
            downlink: self.downlink.clone(),
        }
    }
}

impl<U, D> fmt::Debug for Channels<U, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channels")
            .field("uplink", &self.uplink.name())
            .field("downlink", &self.downlink.name())
            .finish()
    }
}
