// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Registration identifiers and the handles returned by `add_reducer`,
//! `tap` and `subscribe`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Key under which a handler is stored in its channel.
///
/// Registering twice under the same id and event type replaces the first
/// handler in place (same position in the fold/dispatch order).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(String);

impl RegistrationId {
    /// Fresh random (UUID v4) identifier.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegistrationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RegistrationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Which registry a handle points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlerKind {
    Reducer,
    Tap,
    Subscriber,
}

type Remove = Box<dyn Fn() -> bool + Send + Sync>;

/// Handle for one reducer, tap or subscriber registration.
///
/// Dropping the handle does **not** deregister; call [`Registration::unregister`]
/// on teardown or convert it with [`Registration::into_guard`].
pub struct Registration {
    id: RegistrationId,
    etype: String,
    kind: HandlerKind,
    active: AtomicBool,
    remove: Remove,
}

impl Registration {
    pub(crate) fn new(id: RegistrationId, etype: String, kind: HandlerKind, remove: Remove) -> Self {
        Self {
            id,
            etype,
            kind,
            active: AtomicBool::new(true),
            remove,
        }
    }

    /// Identifier this handler is stored under.
    pub fn id(&self) -> &RegistrationId {
        &self.id
    }

    /// Event type channel this handler is registered on.
    pub fn etype(&self) -> &str {
        &self.etype
    }

    /// Whether this handle has not been unregistered yet.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Remove the handler from its channel.
    ///
    /// Returns `true` only when this call removed the handler. Later calls,
    /// calls after the store was dropped, and calls after the id was
    /// re-registered by someone else are no-ops returning `false`.
    pub fn unregister(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        (self.remove)()
    }

    /// Wrap the handle so it unregisters when dropped.
    pub fn into_guard(self) -> RegistrationGuard {
        RegistrationGuard(self)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("etype", &self.etype)
            .field("kind", &self.kind)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Registration that unregisters itself on drop.
#[derive(Debug)]
pub struct RegistrationGuard(Registration);

impl RegistrationGuard {
    /// Borrow the wrapped handle.
    pub fn registration(&self) -> &Registration {
        &self.0
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        self.0.unregister();
    }
}
