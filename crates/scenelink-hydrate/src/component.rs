// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Component contract.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use scenelink_proto::{Props, SceneChannels, Value};

/// What a component sees when it is mounted.
#[derive(Debug, Clone, Copy)]
pub struct MountContext<'a> {
    /// Key of the node being mounted.
    pub key: Option<&'a str>,
    /// Node props (every field other than key, tag and child arrays).
    pub props: &'a Props,
    /// Session channels the component may register handlers on.
    pub channels: &'a SceneChannels,
}

/// Live controller for one node.
///
/// Components are headless: they own bus registrations and local state, not
/// draw calls. The hydrator calls `mount` once, `update` on every re-hydrate
/// that keeps the instance, and `unmount` before dropping it. Registrations
/// made in `mount` must be released in `unmount`.
pub trait Component: Send {
    /// Attach to the session.
    fn mount(&mut self, ctx: &MountContext<'_>);

    /// Props changed while the instance was kept.
    fn update(&mut self, props: &Props);

    /// Detach from the session.
    fn unmount(&mut self);
}

/// Props shared between a component and the handlers it registered.
///
/// Reducers capture a clone; [`SharedProps::replace`] on update makes new
/// values visible to them without re-registering.
#[derive(Debug, Clone, Default)]
pub struct SharedProps(Arc<Mutex<Props>>);

impl SharedProps {
    /// Wrap an initial prop set.
    pub fn new(props: Props) -> Self {
        Self(Arc::new(Mutex::new(props)))
    }

    fn lock(&self) -> MutexGuard<'_, Props> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap in a new prop set.
    pub fn replace(&self, props: &Props) {
        *self.lock() = props.clone();
    }

    /// Clone of one prop.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock().get(name).cloned()
    }

    /// Clone of every prop.
    pub fn snapshot(&self) -> Props {
        self.lock().clone()
    }
}
