// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use scenelink_bus::{BusEvent, Channels, ReducerError, Store, WILDCARD};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration};

#[derive(Debug, Clone, PartialEq)]
struct Ev {
    etype: String,
    n: i64,
    trail: Vec<usize>,
}

impl Ev {
    fn new(etype: &str, n: i64) -> Self {
        Self {
            etype: etype.into(),
            n,
            trail: vec![],
        }
    }
}

impl BusEvent for Ev {
    fn etype(&self) -> &str {
        &self.etype
    }
}

proptest! {
    #[test]
    fn fold_follows_registration_order(count in 0usize..12, n in any::<i32>()) {
        let store = Store::<Ev>::new();
        let regs: Vec<_> = (0..count)
            .map(|i| store.add_reducer("K", move |mut e: Ev| {
                e.trail.push(i);
                Ok(e)
            }))
            .collect();
        let out = store.publish(Ev::new("K", i64::from(n)));
        prop_assert_eq!(out.trail, (0..count).collect::<Vec<_>>());
        prop_assert_eq!(out.n, i64::from(n));
        prop_assert_eq!(regs.len(), count);
    }
}

#[test]
fn publish_equals_r2_of_r1() {
    let store = Store::<Ev>::new();
    let r1 = |mut e: Ev| -> Result<Ev, ReducerError> {
        e.n += 1;
        Ok(e)
    };
    let r2 = |mut e: Ev| -> Result<Ev, ReducerError> {
        e.n *= 10;
        Ok(e)
    };
    let _a = store.add_reducer("K", r1);
    let _b = store.add_reducer("K", r2);
    let e = Ev::new("K", 4);
    let expected = r2(r1(e.clone()).unwrap()).unwrap();
    assert_eq!(store.publish(e), expected);
    assert_eq!(expected.n, 50);
}

#[test]
fn publish_with_no_handlers_returns_event_unchanged() {
    let store = Store::<Ev>::new();
    let e = Ev::new("NOBODY_LISTENS", 7);
    assert_eq!(store.publish(e.clone()), e);
}

#[tokio::test]
async fn two_click_subscribers_each_run_once() {
    let store = Store::<Ev>::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let tx2 = tx.clone();
    let _a = store.subscribe("CLICK", move |e| {
        let _ = tx.send(("a", e));
    });
    let _b = store.subscribe("CLICK", move |e| {
        let _ = tx2.send(("b", e));
    });
    let published = store.publish(Ev::new("CLICK", 1));

    let mut seen = Vec::new();
    for _ in 0..2 {
        let got = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        seen.push(got);
    }
    sleep(Duration::from_millis(10)).await;
    assert!(rx.try_recv().is_err(), "no extra deliveries");
    seen.sort_by_key(|(who, _)| *who);
    assert_eq!(seen[0], ("a", published.clone()));
    assert_eq!(seen[1], ("b", published));
}

#[tokio::test]
async fn unsubscribed_handler_is_never_invoked() {
    let store = Store::<Ev>::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let reg = store.subscribe("CLICK", move |_e| {
        h.fetch_add(1, Ordering::SeqCst);
    });
    assert!(reg.unregister());
    store.publish(Ev::new("CLICK", 0));
    sleep(Duration::from_millis(20)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(store.subscriber_count("CLICK"), 0);
}

#[tokio::test]
async fn wildcard_receives_every_etype_in_addition_to_typed() {
    let store = Store::<Ev>::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<(&'static str, String)>();
    let tx_typed = tx.clone();
    let _all = store.subscribe(WILDCARD, move |e: Ev| {
        let _ = tx.send(("*", e.etype));
    });
    let _typed = store.subscribe("A", move |e: Ev| {
        let _ = tx_typed.send(("A", e.etype));
    });

    store.publish(Ev::new("A", 0));
    store.publish(Ev::new("B", 0));

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap());
    }
    seen.sort();
    assert_eq!(
        seen,
        vec![("*", "A".to_string()), ("*", "B".to_string()), ("A", "A".to_string())]
    );
}

#[tokio::test]
async fn channels_are_independent_stores() {
    let channels: Channels<Ev, Ev> = Channels::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let _s = channels.downlink.subscribe("X", move |_e| {
        h.fetch_add(1, Ordering::SeqCst);
    });
    channels.uplink.publish(Ev::new("X", 0));
    let clone = channels.clone();
    clone.downlink.publish(Ev::new("X", 0));
    sleep(Duration::from_millis(10)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn wildcard_delivery_keeps_publish_order_on_multi_thread_runtime() {
    const N: i64 = 20_000;
    let store = Store::<Ev>::new();
    let seen = Arc::new(Mutex::new(Vec::with_capacity(N as usize)));
    let sink = Arc::clone(&seen);
    let _all = store.subscribe(WILDCARD, move |e: Ev| sink.lock().unwrap().push(e.n));

    for n in 0..N {
        store.publish(Ev::new(if n % 2 == 0 { "OBJECT_MOVE" } else { "OBJECT_MOVE_END" }, n));
    }
    timeout(Duration::from_secs(10), async {
        while seen.lock().unwrap().len() < N as usize {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(*seen.lock().unwrap(), (0..N).collect::<Vec<_>>());
}

#[tokio::test]
async fn subscriber_sees_tap_output_order() {
    let store = Store::<Ev>::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (t, s) = (Arc::clone(&order), Arc::clone(&order));
    let _sub = store.subscribe("K", move |e: Ev| s.lock().unwrap().push(("sub", e.n)));
    let _tap = store.tap("K", move |e: &Ev| t.lock().unwrap().push(("tap", e.n)));
    store.publish(Ev::new("K", 1));
    assert_eq!(*order.lock().unwrap(), vec![("tap", 1)]);
    sleep(Duration::from_millis(10)).await;
    assert_eq!(*order.lock().unwrap(), vec![("tap", 1), ("sub", 1)]);
}
