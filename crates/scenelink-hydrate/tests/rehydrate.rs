// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! Tree patches pushed over the downlink keep keyed instances alive.

use std::sync::Arc;

use scenelink_hydrate::{ComponentRegistry, SceneHost};
use scenelink_proto::value::{get_path, text};
use scenelink_proto::{etype, scene_channels, DownlinkEvent, Node, UplinkEvent, Value};

fn nodes(list: &[Node]) -> Value {
    Value::Array(
        list.iter()
            .map(|n| Value::serialized(n).unwrap())
            .collect(),
    )
}

#[tokio::test]
async fn upsert_updates_background_in_place() {
    let channels = scene_channels();
    let mut host = SceneHost::attach(&channels, Arc::new(ComponentRegistry::builtin()));

    let scene = Node::new("Scene")
        .with_key("root")
        .with_child(Node::new("Background").with_key("bg").with_prop("color", "red"))
        .with_child(Node::new("mesh").with_key("box"));
    channels
        .downlink
        .publish(DownlinkEvent::new(etype::SET).with_data(Value::serialized(&scene).unwrap()));
    assert_eq!(host.next().await, Some(1));
    let bg_id = host.hydrator().find("bg").unwrap().id();

    let out = channels.uplink.publish(UplinkEvent::new(etype::CAMERA_MOVE));
    assert_eq!(get_path(&out.value, &["world", "background"]).and_then(text), Some("red"));

    channels.downlink.publish(DownlinkEvent::new(etype::UPSERT).with_data(Value::Map(vec![(
        "nodes".into(),
        nodes(&[Node::new("Background").with_key("bg").with_prop("color", "navy")]),
    )])));
    assert_eq!(host.next().await, Some(1));

    assert_eq!(host.hydrator().find("bg").unwrap().id(), bg_id);
    let out = channels.uplink.publish(UplinkEvent::new(etype::CAMERA_MOVE));
    assert_eq!(get_path(&out.value, &["world", "background"]).and_then(text), Some("navy"));
    assert_eq!(channels.uplink.reducer_count(etype::CAMERA_MOVE), 2);
}

#[tokio::test]
async fn remove_unmounts_subtree() {
    let channels = scene_channels();
    let mut host = SceneHost::attach(&channels, Arc::new(ComponentRegistry::builtin()));
    let scene = Node::new("Scene").with_key("root").with_child(
        Node::new("Group")
            .with_key("g")
            .with_child(Node::new("RenderParams").with_key("rp").with_prop("shadows", true)),
    );
    channels
        .downlink
        .publish(DownlinkEvent::new(etype::SET).with_data(Value::serialized(&scene).unwrap()));
    channels.downlink.publish(DownlinkEvent::new(etype::REMOVE).with_data(Value::Map(vec![(
        "keys".into(),
        Value::Array(vec!["g".into()]),
    )])));

    assert_eq!(host.next().await, Some(2));
    assert!(host.hydrator().find("rp").is_none());
    assert_eq!(host.hydrator().len(), 1);
    // Only the Scene reducer is left.
    assert_eq!(channels.uplink.reducer_count(etype::CAMERA_MOVE), 1);
}

#[tokio::test]
async fn repeated_add_of_a_keyed_node_releases_every_copy() {
    let channels = scene_channels();
    let mut host = SceneHost::attach(&channels, Arc::new(ComponentRegistry::builtin()));
    let scene = Node::new("Scene").with_key("root");
    channels
        .downlink
        .publish(DownlinkEvent::new(etype::SET).with_data(Value::serialized(&scene).unwrap()));
    let add = || {
        DownlinkEvent::new(etype::ADD).with_data(Value::Map(vec![(
            "nodes".into(),
            nodes(&[Node::new("Background").with_key("bg").with_prop("color", "red")]),
        )]))
    };
    channels.downlink.publish(add());
    channels.downlink.publish(add());
    assert_eq!(host.next().await, Some(3));
    assert_eq!(channels.uplink.reducer_count(etype::CAMERA_MOVE), 3);

    let remove_bg = || {
        DownlinkEvent::new(etype::REMOVE).with_data(Value::Map(vec![(
            "keys".into(),
            Value::Array(vec!["bg".into()]),
        )]))
    };
    channels.downlink.publish(remove_bg());
    assert_eq!(host.next().await, Some(1));
    assert_eq!(channels.uplink.reducer_count(etype::CAMERA_MOVE), 2);

    channels.downlink.publish(remove_bg());
    assert_eq!(host.next().await, Some(1));
    assert_eq!(channels.uplink.reducer_count(etype::CAMERA_MOVE), 1);

    host.detach();
    assert_eq!(channels.uplink.reducer_count(etype::CAMERA_MOVE), 0);
}
