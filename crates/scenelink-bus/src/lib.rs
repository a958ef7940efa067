// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Event bus shared by the scenelink session, scene host and components.
//!
//! A [`Store`] keeps three registries per event type:
//!
//! * **reducers** run synchronously inside [`Store::publish`], folded in
//!   registration order, each receiving the previous reducer's output;
//! * **taps** see the final event synchronously, right after the fold;
//! * **subscribers** observe the final event later. Calls are queued to a
//!   single dispatcher task per store on the current tokio runtime, so
//!   `publish` returns before any of them has run and they run in publish
//!   order on any runtime flavour.
//!
//! Taps and subscribers registered on [`WILDCARD`] receive every event, after
//! the type-specific ones. Registration returns a [`Registration`] handle that the
//! owner keeps for its lifetime and uses to deregister.
//!
//! [`Channels`] bundles the two stores a session works with: `uplink`
//! (client → server) and `downlink` (server → client).

mod channels;
mod registration;
mod store;

pub use channels::Channels;
pub use registration::{Registration, RegistrationGuard, RegistrationId};
pub use store::Store;

use thiserror::Error;

/// Channel name whose subscribers receive every published event.
pub const WILDCARD: &str = "*";

/// Anything that can travel over a [`Store`].
///
/// Events are cloned once per reducer call and once per scheduled subscriber,
/// so they should be cheap to clone relative to the work done per event.
pub trait BusEvent: Clone + Send + 'static {
    /// Discriminator used to select the reducer/subscriber channel.
    fn etype(&self) -> &str;
}

/// Failure reported by a reducer.
///
/// The bus logs the error and continues the fold with the event the failing
/// reducer received; later reducers and subscriber dispatch are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ReducerError(pub String);

impl ReducerError {
    /// Build an error from any displayable message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
