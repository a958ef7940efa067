// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]

use proptest::prelude::*;
use scenelink_tree::{find_by_key, upsert, Child, ChildAttr, Node};

fn flat_tree(keys: &[String]) -> Node {
    keys.iter().fold(Node::new("Scene").with_key("root"), |root, k| {
        root.with_child(Node::new("Box").with_key(k.clone()))
    })
}

fn child_count(root: &Node) -> usize {
    root.children.as_ref().map_or(0, Vec::len)
}

proptest! {
    #[test]
    fn upsert_existing_key_updates_in_place(
        keys in prop::collection::btree_set("[a-z]{1,6}", 1..8),
        pick in any::<prop::sample::Index>(),
        color in "[a-z]{3,8}",
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let target = pick.get(&keys).clone();
        let mut root = flat_tree(&keys);
        let before_len = child_count(&root);
        let before: *const Node = find_by_key(&root, &target, &[]).unwrap();

        upsert(
            &mut root,
            [Node::new("Box").with_key(target.clone()).with_prop("color", color.as_str())],
            ChildAttr::Children,
        );

        let after = find_by_key(&root, &target, &[]).unwrap();
        prop_assert!(std::ptr::eq(before, after));
        prop_assert_eq!(after.props.get("color").and_then(|v| v.as_text()), Some(color.as_str()));
        prop_assert_eq!(child_count(&root), before_len);
    }

    #[test]
    fn upsert_absent_key_appends_exactly_one(
        keys in prop::collection::btree_set("[a-z]{1,6}", 0..8),
        fresh in "[A-Z]{1,6}",
    ) {
        let keys: Vec<String> = keys.into_iter().collect();
        let mut root = flat_tree(&keys);
        let before_len = child_count(&root);
        prop_assert!(find_by_key(&root, &fresh, &[]).is_none());

        upsert(&mut root, [Node::new("Box").with_key(fresh.clone())], ChildAttr::Children);

        prop_assert_eq!(child_count(&root), before_len + 1);
        prop_assert!(find_by_key(&root, &fresh, &[]).is_some());
        let last = root.children.as_ref().and_then(|c| c.last()).and_then(Child::key);
        prop_assert_eq!(last, Some(fresh.as_str()));
    }
}

#[test]
fn finds_nested_key_c() {
    let root = Node::new("Scene")
        .with_key("root")
        .with_child(Node::new("Box").with_key("a"))
        .with_child(
            Node::new("Group")
                .with_key("b")
                .with_child(Node::new("Sphere").with_key("c")),
        );
    let found = find_by_key(&root, "c", &[]).unwrap();
    assert_eq!(found.key.as_deref(), Some("c"));
    assert!(found.children.is_none());
}
