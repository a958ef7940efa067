// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless hydration of scene node trees.
//!
//! The [`Hydrator`] walks a [`Node`](scenelink_proto::Node) tree and keeps a
//! parallel tree of live [`Instance`]s. Each node's tag is looked up in a
//! closed [`ComponentRegistry`]; known tags get a [`Component`] that is
//! mounted against the session channels, unknown tags fall back to plain
//! host instances carrying the same props. Re-hydrating keeps instances
//! whose identity (key, else position) and tag are unchanged, so component
//! state survives tree patches.
//!
//! [`SceneHost`] ties the pieces to a session: downlink tree edits are
//! applied to a [`SceneTree`](scenelink_proto::SceneTree) and re-hydrated.

pub mod builtin;
mod component;
mod host;
mod hydrator;
mod registry;

pub use component::{Component, MountContext, SharedProps};
pub use host::SceneHost;
pub use hydrator::{HydrateStats, Hydrator, Instance, InstanceId, InstanceKind};
pub use registry::{ComponentFactory, ComponentRegistry, ComponentRegistryBuilder, Resolution};
