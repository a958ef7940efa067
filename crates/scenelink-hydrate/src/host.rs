// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Downlink → tree → hydrator bridge.

use std::sync::Arc;

use scenelink_bus::RegistrationGuard;
use scenelink_proto::{etype, DownlinkEvent, SceneChannels, SceneTree};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{ComponentRegistry, Hydrator};

/// Holds the scene tree for one session and keeps it hydrated.
///
/// Tree edits are captured by downlink taps, after any reducers, so they
/// queue in publish order. Nothing is applied until [`SceneHost::drain`] or
/// [`SceneHost::next`] runs, which keeps all tree mutation on the caller's
/// task.
pub struct SceneHost {
    tree: SceneTree,
    hydrator: Hydrator,
    rx: mpsc::UnboundedReceiver<DownlinkEvent>,
    taps: Vec<RegistrationGuard>,
}

impl SceneHost {
    /// Start listening for tree edits on `channels.downlink`.
    pub fn attach(channels: &SceneChannels, registry: Arc<ComponentRegistry>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let taps = etype::TREE_EDITS
            .into_iter()
            .map(|et| {
                let tx = tx.clone();
                channels
                    .downlink
                    .tap(et, move |e: &DownlinkEvent| {
                        // Receiver gone means the host was detached.
                        let _ = tx.send(e.clone());
                    })
                    .into_guard()
            })
            .collect();
        Self {
            tree: SceneTree::new(),
            hydrator: Hydrator::new(registry, channels.clone()),
            rx,
            taps,
        }
    }

    /// Current tree.
    pub fn tree(&self) -> &SceneTree {
        &self.tree
    }

    /// Current instances.
    pub fn hydrator(&self) -> &Hydrator {
        &self.hydrator
    }

    /// Apply every queued edit, then re-hydrate if the tree changed.
    /// Returns the number of edits that changed the tree.
    pub fn drain(&mut self) -> usize {
        let changed = self.drain_pending();
        if changed > 0 {
            self.rehydrate();
        }
        changed
    }

    /// Wait for at least one edit, apply it together with anything else
    /// queued, and re-hydrate. `None` once the host is detached from every
    /// etype.
    pub async fn next(&mut self) -> Option<usize> {
        let first = self.rx.recv().await?;
        let changed = usize::from(self.apply(&first)) + self.drain_pending();
        if changed > 0 {
            self.rehydrate();
        }
        Some(changed)
    }

    fn drain_pending(&mut self) -> usize {
        let mut changed = 0;
        while let Ok(event) = self.rx.try_recv() {
            changed += usize::from(self.apply(&event));
        }
        changed
    }

    /// Apply one downlink event to the tree without re-hydrating.
    ///
    /// Malformed tree edits are logged and ignored.
    pub fn apply(&mut self, event: &DownlinkEvent) -> bool {
        match event.tree_patch() {
            Ok(Some(patch)) => {
                let changed = self.tree.apply(patch);
                debug!(etype = %event.etype, changed, revision = self.tree.revision(), "tree edit");
                changed
            }
            Ok(None) => false,
            Err(err) => {
                warn!(%err, "malformed tree edit dropped");
                false
            }
        }
    }

    fn rehydrate(&mut self) {
        match self.tree.root() {
            Some(root) => {
                self.hydrator.hydrate(root);
            }
            None => {
                self.hydrator.clear();
            }
        }
    }

    /// Stop listening and unmount every instance.
    pub fn detach(mut self) {
        self.taps.clear();
        self.hydrator.clear();
    }
}

impl std::fmt::Debug for SceneHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneHost")
            .field("revision", &self.tree.revision())
            .field("instances", &self.hydrator.len())
            .field("taps", &self.taps.len())
            .finish_non_exhaustive()
    }
}
