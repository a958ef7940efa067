// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! Channel behaviour over the real event types, plus wire framing laws.

use proptest::prelude::*;
use scenelink_bus::ReducerError;
use scenelink_proto::value::{get_path, set_path, text};
use scenelink_proto::wire::{decode_downlink, decode_uplink, encode_downlink, encode_uplink};
use scenelink_proto::{etype, scene_channels, DownlinkEvent, UplinkEvent, Value};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

#[tokio::test]
async fn camera_move_reducer_decorates_uplink_event() {
    let channels = scene_channels();
    let _bg = channels.uplink.add_reducer(etype::CAMERA_MOVE, |mut e: UplinkEvent| {
        set_path(&mut e.value, &["world", "background"], "red".into());
        Ok::<_, ReducerError>(e)
    });

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _sub = channels.uplink.subscribe(etype::CAMERA_MOVE, move |e: UplinkEvent| {
        sink.lock().unwrap().push(e);
    });

    let out = channels.uplink.publish(UplinkEvent::new(etype::CAMERA_MOVE));
    assert_eq!(
        get_path(&out.value, &["world", "background"]).and_then(text),
        Some("red")
    );

    sleep(Duration::from_millis(10)).await;
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(
        get_path(&seen[0].value, &["world", "background"]).and_then(text),
        Some("red")
    );
    // The downlink store never saw it.
    assert_eq!(channels.downlink.subscriber_count(etype::CAMERA_MOVE), 0);
}

#[tokio::test]
async fn downlink_wildcard_sees_tree_edits_and_custom_events() {
    let channels = scene_channels();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _all = channels
        .downlink
        .subscribe(scenelink_bus::WILDCARD, move |e: DownlinkEvent| {
            sink.lock().unwrap().push(e.etype);
        });

    channels.downlink.publish(DownlinkEvent::new(etype::SET));
    channels.downlink.publish(DownlinkEvent::new("TOAST"));
    sleep(Duration::from_millis(10)).await;

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["SET".to_owned(), "TOAST".to_owned()]);
}

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[a-z]{0,8}".prop_map(Value::Text),
        proptest::collection::vec(any::<u8>(), 0..8).prop_map(Value::Bytes),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::vec(("[a-z]{1,6}", inner), 0..4).prop_map(|entries| {
                Value::Map(
                    entries
                        .into_iter()
                        .map(|(k, v)| (Value::Text(k), v))
                        .collect(),
                )
            }),
        ]
    })
}

proptest! {
    #[test]
    fn uplink_frames_preserve_events(
        et in "[A-Z_]{1,12}",
        key in proptest::option::of("[a-z0-9]{1,8}"),
        value in value_strategy(),
        ts in any::<u64>(),
    ) {
        let event = UplinkEvent { etype: et, key, value, ts };
        let bytes = encode_uplink(&event).unwrap();
        let (back, used) = decode_uplink(&bytes).unwrap();
        prop_assert_eq!(used, bytes.len());
        prop_assert_eq!(back, event);
    }

    #[test]
    fn downlink_frames_preserve_events(
        et in "[A-Z_]{1,12}",
        data in value_strategy(),
    ) {
        let event = DownlinkEvent::new(et).with_data(data);
        let bytes = encode_downlink(&event).unwrap();
        let (back, _) = decode_downlink(&bytes).unwrap();
        prop_assert_eq!(back, event);
    }
}
