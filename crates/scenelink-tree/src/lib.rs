// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Declarative scene node tree shared by the scenelink session and hydrator.
//!
//! A [`Node`] is a tag, an optional key, optional child arrays and free-form
//! props. The tree is owned by one party (the scene host) and edited in place
//! through the key-addressed helpers in [`ops`] or by applying a
//! [`TreePatch`] to a [`SceneTree`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod ops;
mod patch;

pub use ops::{add_node, find_by_key, find_by_key_mut, remove_by_key, remove_deep, update, upsert};
pub use patch::{SceneTree, TreePatch};

/// Schemaless prop value (JSON-compatible data plus byte strings).
pub type Value = ciborium::Value;

/// Free-form node properties, passed verbatim to the resolved component.
pub type Props = BTreeMap<String, Value>;

/// Named child arrays a node may carry.
///
/// `children` is the ordinary array; the others hold nodes that a container
/// renders in a different layer (raw scene objects, HTML overlays,
/// background).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChildAttr {
    /// `children`
    Children,
    /// `rawChildren`
    Raw,
    /// `htmlChildren`
    Html,
    /// `bgChildren`
    Background,
}

impl ChildAttr {
    /// Every attr, in search order.
    pub const ALL: [ChildAttr; 4] = [
        ChildAttr::Children,
        ChildAttr::Raw,
        ChildAttr::Html,
        ChildAttr::Background,
    ];

    /// Field name on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            ChildAttr::Children => "children",
            ChildAttr::Raw => "rawChildren",
            ChildAttr::Html => "htmlChildren",
            ChildAttr::Background => "bgChildren",
        }
    }

    /// Parse a wire field name.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.wire_name() == name)
    }
}

/// One entry of a child array: a nested node or a literal text leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Child {
    /// Literal text, never resolved against the registry.
    Text(String),
    /// Nested node.
    Node(Node),
}

impl Child {
    /// Key of the nested node, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Child::Node(n) => n.key.as_deref(),
            Child::Text(_) => None,
        }
    }

    /// Borrow the nested node.
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Child::Node(n) => Some(n),
            Child::Text(_) => None,
        }
    }

    /// Mutably borrow the nested node.
    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Child::Node(n) => Some(n),
            Child::Text(_) => None,
        }
    }

    /// Take the nested node out.
    pub fn into_node(self) -> Option<Node> {
        match self {
            Child::Node(n) => Some(n),
            Child::Text(_) => None,
        }
    }
}

impl From<Node> for Child {
    fn from(node: Node) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_owned())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

/// Scene node.
///
/// Nodes that will be targeted by find/remove/upsert must carry a `key`
/// unique within the tree. Trees are acyclic by construction (owned values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Addressing and reconciliation identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Registry tag; unknown tags hydrate as literal host elements.
    pub tag: String,
    /// Ordinary children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Child>>,
    /// Raw scene-object children.
    #[serde(
        rename = "rawChildren",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub raw_children: Option<Vec<Child>>,
    /// HTML overlay children.
    #[serde(
        rename = "htmlChildren",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub html_children: Option<Vec<Child>>,
    /// Background-layer children.
    #[serde(rename = "bgChildren", default, skip_serializing_if = "Option::is_none")]
    pub bg_children: Option<Vec<Child>>,
    /// Every other field.
    #[serde(flatten)]
    pub props: Props,
}

impl Node {
    /// Node with the given tag and nothing else.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            key: None,
            tag: tag.into(),
            children: None,
            raw_children: None,
            html_children: None,
            bg_children: None,
            props: Props::new(),
        }
    }

    /// Set the key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set one prop.
    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Append one entry to `children`.
    pub fn with_child(mut self, child: impl Into<Child>) -> Self {
        self.slot_entry(ChildAttr::Children).push(child.into());
        self
    }

    /// Append one entry to the named child array.
    pub fn with_child_in(mut self, attr: ChildAttr, child: impl Into<Child>) -> Self {
        self.slot_entry(attr).push(child.into());
        self
    }

    /// Borrow a child array.
    pub fn slot(&self, attr: ChildAttr) -> Option<&Vec<Child>> {
        match attr {
            ChildAttr::Children => self.children.as_ref(),
            ChildAttr::Raw => self.raw_children.as_ref(),
            ChildAttr::Html => self.html_children.as_ref(),
            ChildAttr::Background => self.bg_children.as_ref(),
        }
    }

    /// Mutably borrow a child array.
    pub fn slot_mut(&mut self, attr: ChildAttr) -> Option<&mut Vec<Child>> {
        self.slot_field(attr).as_mut()
    }

    /// Mutably borrow a child array, creating it when absent.
    pub fn slot_entry(&mut self, attr: ChildAttr) -> &mut Vec<Child> {
        self.slot_field(attr).get_or_insert_with(Vec::new)
    }

    fn slot_field(&mut self, attr: ChildAttr) -> &mut Option<Vec<Child>> {
        match attr {
            ChildAttr::Children => &mut self.children,
            ChildAttr::Raw => &mut self.raw_children,
            ChildAttr::Html => &mut self.html_children,
            ChildAttr::Background => &mut self.bg_children,
        }
    }

    /// Nested nodes of `children` plus the `extra` arrays, in
    /// [`ChildAttr::ALL`] order.
    pub fn child_nodes<'a>(&'a self, extra: &[ChildAttr]) -> impl Iterator<Item = &'a Node> + 'a {
        let pick = selected(extra);
        ChildAttr::ALL
            .into_iter()
            .zip(pick)
            .filter(|(_, wanted)| *wanted)
            .filter_map(move |(attr, _)| self.slot(attr))
            .flat_map(|slot| slot.iter())
            .filter_map(Child::as_node)
    }

    /// Mutable variant of [`Node::child_nodes`].
    pub fn child_nodes_mut<'a>(
        &'a mut self,
        extra: &[ChildAttr],
    ) -> impl Iterator<Item = &'a mut Node> + 'a {
        let pick = selected(extra);
        let Node {
            children,
            raw_children,
            html_children,
            bg_children,
            ..
        } = self;
        [children, raw_children, html_children, bg_children]
            .into_iter()
            .zip(pick)
            .filter(|(_, wanted)| *wanted)
            .filter_map(|(slot, _)| slot.as_mut())
            .flat_map(|slot| slot.iter_mut())
            .filter_map(Child::as_node_mut)
    }

    /// Whether an immediate child (in `children` or `extra`) has `key`.
    pub fn has_child_key(&self, key: &str, extra: &[ChildAttr]) -> bool {
        self.child_nodes(extra).any(|n| n.key.as_deref() == Some(key))
    }

    /// Shallow-merge `other` onto `self`: tag and present child arrays are
    /// replaced, props are merged field by field, the key is kept unless
    /// `other` carries one.
    pub fn merge_from(&mut self, other: Node) {
        let Node {
            key,
            tag,
            children,
            raw_children,
            html_children,
            bg_children,
            props,
        } = other;
        if key.is_some() {
            self.key = key;
        }
        self.tag = tag;
        for (attr, incoming) in ChildAttr::ALL
            .into_iter()
            .zip([children, raw_children, html_children, bg_children])
        {
            if let Some(incoming) = incoming {
                *self.slot_field(attr) = Some(incoming);
            }
        }
        self.props.extend(props);
    }
}

fn selected(extra: &[ChildAttr]) -> [bool; 4] {
    ChildAttr::ALL.map(|attr| attr == ChildAttr::Children || extra.contains(&attr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        Node::new("Scene")
            .with_key("root")
            .with_prop("up", Value::Array(vec![0.into(), 1.into(), 0.into()]))
            .with_child(Node::new("Box").with_key("a"))
            .with_child("caption")
            .with_child_in(ChildAttr::Background, Node::new("Sky").with_key("sky"))
    }

    #[test]
    fn cbor_round_trip_keeps_slots_and_props() {
        let node = sample();
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&node, &mut bytes).unwrap();
        let back: Node = ciborium::de::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn unknown_fields_land_in_props() {
        let value = Value::Map(vec![
            ("tag".into(), "Box".into()),
            ("key".into(), "b".into()),
            ("color".into(), "red".into()),
        ]);
        let node: Node = value.deserialized().unwrap();
        assert_eq!(node.key.as_deref(), Some("b"));
        assert_eq!(node.props.get("color"), Some(&Value::Text("red".into())));
        assert!(node.children.is_none());
    }

    #[test]
    fn child_nodes_skips_text_and_unselected_slots() {
        let node = sample();
        let keys: Vec<_> = node.child_nodes(&[]).filter_map(|n| n.key.as_deref()).collect();
        assert_eq!(keys, vec!["a"]);
        let keys: Vec<_> = node
            .child_nodes(&[ChildAttr::Background])
            .filter_map(|n| n.key.as_deref())
            .collect();
        assert_eq!(keys, vec!["a", "sky"]);
    }

    #[test]
    fn merge_replaces_present_fields_only() {
        let mut node = sample();
        node.merge_from(Node::new("Scene").with_prop("bg", "black"));
        assert_eq!(node.key.as_deref(), Some("root"));
        assert!(node.props.contains_key("up"));
        assert!(node.props.contains_key("bg"));
        assert_eq!(node.children.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn child_attr_wire_names_round_trip() {
        for attr in ChildAttr::ALL {
            assert_eq!(ChildAttr::from_wire(attr.wire_name()), Some(attr));
        }
        assert_eq!(ChildAttr::from_wire("nope"), None);
    }
}
