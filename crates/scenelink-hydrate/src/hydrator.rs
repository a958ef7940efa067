// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Key-stable reconciliation of a node tree into live instances.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use scenelink_proto::{Child, ChildAttr, Node, Props, SceneChannels};
use tracing::debug;

use crate::{Component, ComponentRegistry, MountContext, Resolution};

/// Stable identifier of a live instance; survives in-place updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an instance was resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceKind {
    /// Registered component.
    Component,
    /// Unknown tag rendered as a literal host element.
    Host,
    /// Literal text child.
    Text(String),
}

/// One live node.
pub struct Instance {
    id: InstanceId,
    key: Option<String>,
    tag: String,
    kind: InstanceKind,
    props: Props,
    children: BTreeMap<ChildAttr, Vec<Instance>>,
    component: Option<Box<dyn Component>>,
}

impl Instance {
    /// Stable id.
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Node key.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Node tag; empty for text.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Resolution kind.
    pub fn kind(&self) -> &InstanceKind {
        &self.kind
    }

    /// Props as last hydrated.
    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Hydrated entries of one child array.
    pub fn children(&self, attr: ChildAttr) -> &[Instance] {
        self.children.get(&attr).map(Vec::as_slice).unwrap_or_default()
    }

    fn find(&self, key: &str) -> Option<&Instance> {
        if self.key.as_deref() == Some(key) {
            return Some(self);
        }
        self.children
            .values()
            .flatten()
            .find_map(|child| child.find(key))
    }

    fn count(&self) -> usize {
        1 + self.children.values().flatten().map(Instance::count).sum::<usize>()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Counts from one hydration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HydrateStats {
    /// Instances created.
    pub mounted: usize,
    /// Instances kept and updated in place.
    pub updated: usize,
    /// Instances torn down.
    pub unmounted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Identity {
    Key(String),
    Index(usize),
}

fn identity(key: Option<&str>, index: usize) -> Identity {
    key.map_or(Identity::Index(index), |k| Identity::Key(k.to_owned()))
}

/// Owns the instance tree for one scene.
pub struct Hydrator {
    registry: Arc<ComponentRegistry>,
    channels: SceneChannels,
    root: Option<Instance>,
    next_id: u64,
}

impl Hydrator {
    /// Hydrator resolving tags against `registry` and mounting components on
    /// `channels`.
    pub fn new(registry: Arc<ComponentRegistry>, channels: SceneChannels) -> Self {
        Self {
            registry,
            channels,
            root: None,
            next_id: 0,
        }
    }

    /// Current root instance.
    pub fn root(&self) -> Option<&Instance> {
        self.root.as_ref()
    }

    /// First instance (depth-first) whose key is `key`.
    pub fn find(&self, key: &str) -> Option<&Instance> {
        self.root.as_ref().and_then(|r| r.find(key))
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.root.as_ref().map_or(0, Instance::count)
    }

    /// Whether nothing is hydrated.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Reconcile the instance tree against `node`.
    ///
    /// An instance is kept when its identity (key, or sibling position for
    /// unkeyed nodes) and tag match; its props are replaced and its component
    /// is told via [`Component::update`]. Everything else is unmounted and
    /// mounted afresh.
    pub fn hydrate(&mut self, node: &Node) -> HydrateStats {
        let mut stats = HydrateStats::default();
        let root = match self.root.take() {
            Some(mut old) if old.key.as_deref() == node.key.as_deref() && old.tag == node.tag => {
                self.update(&mut old, node, &mut stats);
                old
            }
            Some(mut old) => {
                Self::unmount(&mut old, &mut stats);
                self.mount(node, &mut stats)
            }
            None => self.mount(node, &mut stats),
        };
        self.root = Some(root);
        debug!(
            mounted = stats.mounted,
            updated = stats.updated,
            unmounted = stats.unmounted,
            "hydrated"
        );
        stats
    }

    /// Unmount everything.
    pub fn clear(&mut self) -> HydrateStats {
        let mut stats = HydrateStats::default();
        if let Some(mut root) = self.root.take() {
            Self::unmount(&mut root, &mut stats);
        }
        stats
    }

    fn alloc_id(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        id
    }

    fn mount(&mut self, node: &Node, stats: &mut HydrateStats) -> Instance {
        let id = self.alloc_id();
        let (kind, component) = match self.registry.resolve(&node.tag) {
            Resolution::Component(factory) => {
                let mut component = factory();
                component.mount(&MountContext {
                    key: node.key.as_deref(),
                    props: &node.props,
                    channels: &self.channels,
                });
                (InstanceKind::Component, Some(component))
            }
            Resolution::Host => (InstanceKind::Host, None),
        };
        debug!(%id, tag = %node.tag, key = ?node.key, ?kind, "mounted");
        stats.mounted += 1;

        let mut children = BTreeMap::new();
        for attr in ChildAttr::ALL {
            if let Some(slot) = node.slot(attr) {
                let hydrated: Vec<Instance> = slot
                    .iter()
                    .map(|child| self.mount_child(child, stats))
                    .collect();
                children.insert(attr, hydrated);
            }
        }
        Instance {
            id,
            key: node.key.clone(),
            tag: node.tag.clone(),
            kind,
            props: node.props.clone(),
            children,
            component,
        }
    }

    fn mount_child(&mut self, child: &Child, stats: &mut HydrateStats) -> Instance {
        match child {
            Child::Node(node) => self.mount(node, stats),
            Child::Text(text) => {
                stats.mounted += 1;
                Instance {
                    id: self.alloc_id(),
                    key: None,
                    tag: String::new(),
                    kind: InstanceKind::Text(text.clone()),
                    props: Props::new(),
                    children: BTreeMap::new(),
                    component: None,
                }
            }
        }
    }

    fn update(&mut self, inst: &mut Instance, node: &Node, stats: &mut HydrateStats) {
        stats.updated += 1;
        if inst.props != node.props {
            inst.props = node.props.clone();
            if let Some(component) = inst.component.as_mut() {
                component.update(&inst.props);
            }
        }
        for attr in ChildAttr::ALL {
            let old = inst.children.remove(&attr).unwrap_or_default();
            match node.slot(attr) {
                Some(slot) => {
                    let next = self.reconcile(old, slot, stats);
                    inst.children.insert(attr, next);
                }
                None => {
                    for mut gone in old {
                        Self::unmount(&mut gone, stats);
                    }
                }
            }
        }
    }

    fn reconcile(
        &mut self,
        old: Vec<Instance>,
        slot: &[Child],
        stats: &mut HydrateStats,
    ) -> Vec<Instance> {
        // Siblings may share a key; each identity keeps its instances in order.
        let mut by_identity: HashMap<Identity, VecDeque<Instance>> = HashMap::new();
        for (i, inst) in old.into_iter().enumerate() {
            by_identity
                .entry(identity(inst.key.as_deref(), i))
                .or_default()
                .push_back(inst);
        }

        let mut next = Vec::with_capacity(slot.len());
        for (i, child) in slot.iter().enumerate() {
            let previous = by_identity
                .get_mut(&identity(child.key(), i))
                .and_then(VecDeque::pop_front);
            let inst = match (previous, child) {
                (Some(mut inst), Child::Node(node)) if inst.tag == node.tag => {
                    self.update(&mut inst, node, stats);
                    inst
                }
                (Some(mut inst), Child::Text(text))
                    if matches!(inst.kind, InstanceKind::Text(_)) =>
                {
                    stats.updated += 1;
                    inst.kind = InstanceKind::Text(text.clone());
                    inst
                }
                (Some(mut stale), child) => {
                    Self::unmount(&mut stale, stats);
                    self.mount_child(child, stats)
                }
                (None, child) => self.mount_child(child, stats),
            };
            next.push(inst);
        }

        for mut gone in by_identity.into_values().flatten() {
            Self::unmount(&mut gone, stats);
        }
        next
    }

    fn unmount(inst: &mut Instance, stats: &mut HydrateStats) {
        for child in inst.children.values_mut().flatten() {
            Self::unmount(child, stats);
        }
        if let Some(component) = inst.component.as_mut() {
            component.unmount();
        }
        if !matches!(inst.kind, InstanceKind::Text(_)) {
            debug!(id = %inst.id, tag = %inst.tag, key = ?inst.key, "unmounted");
        }
        stats.unmounted += 1;
    }
}

impl Drop for Hydrator {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Hydrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hydrator")
            .field("registry", &self.registry)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
