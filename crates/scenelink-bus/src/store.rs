// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reducer fold, synchronous taps, and the ordered subscriber queue.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use indexmap::IndexMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::registration::{HandlerKind, Registration, RegistrationId};
use crate::{BusEvent, ReducerError, WILDCARD};

type ReducerFn<E> = dyn Fn(E) -> Result<E, ReducerError> + Send + Sync;
type TapFn<E> = dyn Fn(&E) + Send + Sync;
type SubscriberFn<E> = dyn Fn(E) + Send + Sync;

struct Entry<F: ?Sized> {
    nonce: u64,
    f: Arc<F>,
    live: Arc<AtomicBool>,
}

impl<F: ?Sized> Clone for Entry<F> {
    fn clone(&self) -> Self {
        Self {
            nonce: self.nonce,
            f: Arc::clone(&self.f),
            live: Arc::clone(&self.live),
        }
    }
}

type Table<F> = HashMap<String, IndexMap<RegistrationId, Entry<F>>>;

fn insert_entry<F: ?Sized>(table: &mut Table<F>, etype: &str, id: RegistrationId, entry: Entry<F>) {
    let previous = table.entry(etype.to_owned()).or_default().insert(id, entry);
    if let Some(prev) = previous {
        prev.live.store(false, Ordering::Release);
    }
}

fn remove_entry<F: ?Sized>(table: &mut Table<F>, etype: &str, id: &RegistrationId, nonce: u64) -> bool {
    let Some(channel) = table.get_mut(etype) else {
        return false;
    };
    if channel.get(id).map(|e| e.nonce) != Some(nonce) {
        return false;
    }
    if let Some(entry) = channel.shift_remove(id) {
        entry.live.store(false, Ordering::Release);
    }
    if channel.is_empty() {
        table.remove(etype);
    }
    true
}

/// Entries for `etype` in registration order, followed by the wildcard
/// channel when `with_wildcard` is set.
fn snapshot<F: ?Sized>(table: &Table<F>, etype: &str, with_wildcard: bool) -> Vec<Entry<F>> {
    let typed = table.get(etype).into_iter();
    // An event published on "*" itself must not reach wildcard handlers twice.
    let wildcard = (with_wildcard && etype != WILDCARD)
        .then(|| table.get(WILDCARD))
        .flatten()
        .into_iter();
    typed.chain(wildcard).flat_map(|channel| channel.values().cloned()).collect()
}

fn count<F: ?Sized>(table: &Table<F>, etype: &str) -> usize {
    table.get(etype).map_or(0, IndexMap::len)
}

struct Registry<E> {
    reducers: Table<ReducerFn<E>>,
    taps: Table<TapFn<E>>,
    subscribers: Table<SubscriberFn<E>>,
    next_nonce: u64,
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self {
            reducers: HashMap::new(),
            taps: HashMap::new(),
            subscribers: HashMap::new(),
            next_nonce: 0,
        }
    }
}

impl<E> Registry<E> {
    fn alloc_nonce(&mut self) -> u64 {
        let n = self.next_nonce;
        self.next_nonce += 1;
        n
    }

    fn remove(&mut self, kind: HandlerKind, etype: &str, id: &RegistrationId, nonce: u64) -> bool {
        match kind {
            HandlerKind::Reducer => remove_entry(&mut self.reducers, etype, id, nonce),
            HandlerKind::Tap => remove_entry(&mut self.taps, etype, id, nonce),
            HandlerKind::Subscriber => remove_entry(&mut self.subscribers, etype, id, nonce),
        }
    }
}

/// One publish worth of subscriber calls.
struct Job<E> {
    etype: String,
    event: E,
    subscribers: Vec<Entry<SubscriberFn<E>>>,
}

type Queue<E> = Arc<Mutex<Option<mpsc::UnboundedSender<Job<E>>>>>;

/// Event store: per-etype reducer chains, taps and subscriber lists.
///
/// Cloning is cheap and yields another handle to the same registries. The
/// registries are never locked while a handler runs, so handlers may
/// register, unregister or publish re-entrantly.
pub struct Store<E> {
    name: &'static str,
    inner: Arc<Mutex<Registry<E>>>,
    queue: Queue<E>,
}

impl<E> Clone for Store<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<E> Store<E> {
    /// Name used in log lines.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<E: BusEvent> Default for Store<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: BusEvent> Store<E> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::named("store")
    }

    /// Create an empty store whose log lines carry `name` (e.g. "uplink").
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(Registry::default())),
            queue: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<E>> {
        // No handler code runs under this lock, so a poisoned guard still
        // holds consistent maps.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register<F: ?Sized>(
        &self,
        kind: HandlerKind,
        etype: String,
        id: RegistrationId,
        table: fn(&mut Registry<E>) -> &mut Table<F>,
        f: Arc<F>,
    ) -> Registration {
        let nonce = {
            let mut reg = self.lock();
            let nonce = reg.alloc_nonce();
            let entry = Entry {
                nonce,
                f,
                live: Arc::new(AtomicBool::new(true)),
            };
            insert_entry(table(&mut reg), &etype, id.clone(), entry);
            nonce
        };
        debug!(store = self.name, %etype, %id, ?kind, "handler registered");
        self.handle(kind, etype, id, nonce)
    }

    /// Register a reducer under a fresh random id.
    pub fn add_reducer<F>(&self, etype: impl Into<String>, reducer: F) -> Registration
    where
        F: Fn(E) -> Result<E, ReducerError> + Send + Sync + 'static,
    {
        self.add_reducer_with_id(etype, RegistrationId::random(), reducer)
    }

    /// Register a reducer under `id`, replacing any reducer already stored
    /// under that id for `etype` (the replacement keeps the old position).
    pub fn add_reducer_with_id<F>(
        &self,
        etype: impl Into<String>,
        id: impl Into<RegistrationId>,
        reducer: F,
    ) -> Registration
    where
        F: Fn(E) -> Result<E, ReducerError> + Send + Sync + 'static,
    {
        let f: Arc<ReducerFn<E>> = Arc::new(reducer);
        self.register(HandlerKind::Reducer, etype.into(), id.into(), |r| &mut r.reducers, f)
    }

    /// Register a tap under a fresh random id.
    ///
    /// A tap sees the final event synchronously inside [`Store::publish`],
    /// after the reducer fold and before any subscriber is queued. Taps on
    /// [`WILDCARD`] see every event. Use a tap when work must happen in
    /// publish order on the publisher's thread, e.g. feeding an ordered queue.
    pub fn tap<F>(&self, etype: impl Into<String>, tap: F) -> Registration
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.tap_with_id(etype, RegistrationId::random(), tap)
    }

    /// Register a tap under `id`, replacing any tap already stored under
    /// that id for `etype`.
    pub fn tap_with_id<F>(&self, etype: impl Into<String>, id: impl Into<RegistrationId>, tap: F) -> Registration
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let f: Arc<TapFn<E>> = Arc::new(tap);
        self.register(HandlerKind::Tap, etype.into(), id.into(), |r| &mut r.taps, f)
    }

    /// Register a subscriber under a fresh random id.
    pub fn subscribe<F>(&self, etype: impl Into<String>, handler: F) -> Registration
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        self.subscribe_with_id(etype, RegistrationId::random(), handler)
    }

    /// Register a subscriber under `id`, replacing any subscriber already
    /// stored under that id for `etype`.
    pub fn subscribe_with_id<F>(
        &self,
        etype: impl Into<String>,
        id: impl Into<RegistrationId>,
        handler: F,
    ) -> Registration
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        let f: Arc<SubscriberFn<E>> = Arc::new(handler);
        self.register(HandlerKind::Subscriber, etype.into(), id.into(), |r| &mut r.subscribers, f)
    }

    fn handle(
        &self,
        kind: HandlerKind,
        etype: String,
        id: RegistrationId,
        nonce: u64,
    ) -> Registration {
        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.inner);
        let (key, rid) = (etype.clone(), id.clone());
        let remove = Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let mut reg = inner.lock().unwrap_or_else(PoisonError::into_inner);
            reg.remove(kind, &key, &rid, nonce)
        });
        Registration::new(id, etype, kind, remove)
    }

    /// Run the reducer chain for `event`, call its taps, queue its
    /// subscribers, and return the reduced event.
    ///
    /// A reducer that fails or panics is skipped: the fold continues with the
    /// value that reducer was given. A panicking tap is logged and skipped.
    /// Subscribers run later on the store's dispatcher task, in publish order;
    /// without a tokio runtime they are not run at all.
    pub fn publish(&self, event: E) -> E {
        let etype = event.etype().to_owned();
        let reducers = snapshot(&self.lock().reducers, &etype, false);

        let mut current = event;
        for reducer in reducers {
            let input = current.clone();
            match panic::catch_unwind(AssertUnwindSafe(|| (reducer.f)(input))) {
                Ok(Ok(next)) => current = next,
                Ok(Err(err)) => {
                    warn!(store = self.name, %etype, %err, "reducer failed; skipped");
                }
                Err(_) => {
                    warn!(store = self.name, %etype, "reducer panicked; skipped");
                }
            }
        }

        let taps = snapshot(&self.lock().taps, &etype, true);
        for tap in taps {
            if panic::catch_unwind(AssertUnwindSafe(|| (tap.f)(&current))).is_err() {
                warn!(store = self.name, %etype, "tap panicked; skipped");
            }
        }

        let subscribers = snapshot(&self.lock().subscribers, &etype, true);
        if !subscribers.is_empty() {
            self.dispatch(Job {
                etype,
                event: current.clone(),
                subscribers,
            });
        }
        current
    }

    fn dispatch(&self, job: Job<E>) {
        let Ok(rt) = Handle::try_current() else {
            warn!(
                store = self.name,
                etype = %job.etype,
                count = job.subscribers.len(),
                "no async runtime; subscriber dispatch skipped"
            );
            return;
        };
        // Sending under the lock keeps queue order equal to publish order.
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let job = match queue.as_ref() {
            Some(tx) => match tx.send(job) {
                Ok(()) => return,
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };
        // First dispatch, or the runtime that ran the previous dispatcher is gone.
        let (tx, rx) = mpsc::unbounded_channel();
        rt.spawn(run_dispatcher(self.name, rx));
        if tx.send(job).is_err() {
            debug!(store = self.name, "dispatcher stopped before its first job");
        }
        *queue = Some(tx);
    }

    /// Number of reducers registered on `etype`.
    pub fn reducer_count(&self, etype: &str) -> usize {
        count(&self.lock().reducers, etype)
    }

    /// Number of taps registered on `etype` (wildcard not included).
    pub fn tap_count(&self, etype: &str) -> usize {
        count(&self.lock().taps, etype)
    }

    /// Number of subscribers registered on `etype` (wildcard not included).
    pub fn subscriber_count(&self, etype: &str) -> usize {
        count(&self.lock().subscribers, etype)
    }
}

/// Drains one store's subscriber queue. Calls happen one at a time, in
/// publish order, so subscribers should hand long work to their own tasks.
async fn run_dispatcher<E: BusEvent>(store: &'static str, mut rx: mpsc::UnboundedReceiver<Job<E>>) {
    while let Some(job) = rx.recv().await {
        for sub in job.subscribers {
            if !sub.live.load(Ordering::Acquire) {
                continue;
            }
            let event = job.event.clone();
            if panic::catch_unwind(AssertUnwindSafe(|| (sub.f)(event))).is_err() {
                warn!(store, etype = %job.etype, "subscriber panicked; skipped");
            }
        }
    }
    debug!(store, "dispatcher stopped");
}
