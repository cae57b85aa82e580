// ── Snapshot store ──
//
// Lock-free reads through `ArcSwapOption`, push-based change notification
// through a `watch` version counter. Both the persistent channel and the
// fallback poller write here, and both only ever merge.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{FieldValue, Snapshot};

// ── Observers ────────────────────────────────────────────────────────

/// Handle returned by [`SnapshotStore::register_observer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Something that wants to hear about every snapshot mutation.
///
/// Called synchronously on the writer's task, so implementations must
/// return quickly (send on a channel, set a flag, ...).
pub trait SnapshotObserver: Send + Sync {
    /// Called exactly once per successful mutation.
    fn on_snapshot(&self, snapshot: &Arc<Snapshot>);

    /// Called once, for the frame that seeded the snapshot, before
    /// [`on_snapshot`](Self::on_snapshot).
    fn on_first_snapshot(&self, _snapshot: &Arc<Snapshot>) {}
}

type ObserverList = Vec<(ObserverId, Arc<dyn SnapshotObserver>)>;

// ── SnapshotStore ────────────────────────────────────────────────────

/// The single fused view of the most recent device data.
pub struct SnapshotStore {
    current: Arc<ArcSwapOption<Snapshot>>,
    last_update: ArcSwapOption<DateTime<Utc>>,
    version: watch::Sender<u64>,
    observers: ArcSwap<ObserverList>,
    next_observer: AtomicU64,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("version", &*self.version.borrow())
            .field("fields", &self.current.load_full().map(|s| s.len()))
            .field("observers", &self.observers.load().len())
            .finish()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            current: Arc::new(ArcSwapOption::empty()),
            last_update: ArcSwapOption::empty(),
            version,
            observers: ArcSwap::from_pointee(Vec::new()),
            next_observer: AtomicU64::new(1),
        }
    }

    /// Merge one frame. The first non-empty frame seeds the snapshot
    /// wholesale; later frames overwrite only the keys they carry.
    ///
    /// Returns the resulting snapshot, or `None` if the frame was empty and
    /// nothing changed.
    pub fn apply<I>(&self, frame: I) -> Option<Arc<Snapshot>>
    where
        I: IntoIterator<Item = (String, FieldValue)>,
    {
        let update: Vec<(String, FieldValue)> = frame.into_iter().collect();
        if update.is_empty() {
            tracing::trace!("ignoring empty frame");
            return None;
        }

        let previous = self.current.rcu(|current| {
            let next = match current {
                Some(existing) => {
                    let mut merged = Snapshot::clone(existing);
                    merged.merge(update.iter().cloned());
                    merged
                }
                None => update.iter().cloned().collect(),
            };
            Some(Arc::new(next))
        });
        let seeded = previous.is_none();

        let snapshot = self.current.load_full()?;
        self.last_update.store(Some(Arc::new(Utc::now())));
        self.version.send_modify(|v| *v += 1);

        if seeded {
            tracing::debug!(fields = snapshot.len(), "snapshot seeded");
        }
        self.notify(&snapshot, seeded);

        Some(snapshot)
    }

    /// Latest snapshot, or `None` before the first frame.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }

    pub fn has_snapshot(&self) -> bool {
        self.current.load().is_some()
    }

    /// Mutation counter. Zero until the first frame.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Wall-clock time of the last mutation.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update.load().as_deref().copied()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(Arc::clone(&self.current), self.version.subscribe())
    }

    pub fn register_observer(&self, observer: Arc<dyn SnapshotObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer.fetch_add(1, Ordering::Relaxed));
        self.observers.rcu(|list| {
            let mut list = ObserverList::clone(list);
            list.push((id, Arc::clone(&observer)));
            list
        });
        id
    }

    /// Returns `true` if `id` was registered.
    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        let previous = self.observers.rcu(|list| {
            list.iter()
                .filter(|(other, _)| *other != id)
                .cloned()
                .collect::<ObserverList>()
        });
        previous.iter().any(|(other, _)| *other == id)
    }

    fn notify(&self, snapshot: &Arc<Snapshot>, seeded: bool) {
        let observers = self.observers.load();
        for (_, observer) in observers.iter() {
            if seeded {
                observer.on_first_snapshot(snapshot);
            }
            observer.on_snapshot(snapshot);
        }
    }
}

// ── SnapshotStream ───────────────────────────────────────────────────

/// A subscription to snapshot changes.
///
/// Provides point-in-time access and reactive change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotStream {
    current: Option<Arc<Snapshot>>,
    source: Arc<ArcSwapOption<Snapshot>>,
    receiver: watch::Receiver<u64>,
}

impl SnapshotStream {
    fn new(source: Arc<ArcSwapOption<Snapshot>>, mut receiver: watch::Receiver<u64>) -> Self {
        receiver.mark_unchanged();
        let current = source.load_full();
        Self {
            current,
            source,
            receiver,
        }
    }

    /// Snapshot captured at creation time or by the last `changed()`.
    pub fn current(&self) -> Option<&Arc<Snapshot>> {
        self.current.as_ref()
    }

    /// Latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.source.load_full()
    }

    /// Wait for the next mutation and return the new snapshot.
    /// Returns `None` if the store has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        loop {
            self.receiver.changed().await.ok()?;
            self.receiver.mark_unchanged();
            if let Some(snapshot) = self.source.load_full() {
                self.current = Some(Arc::clone(&snapshot));
                return Some(snapshot);
            }
        }
    }

    /// Convert into a `Stream` yielding each new snapshot.
    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::from_changes(self.receiver),
            source: self.source,
        }
    }
}

/// `Stream` adapter over a [`SnapshotStream`].
pub struct SnapshotWatchStream {
    inner: WatchStream<u64>,
    source: Arc<ArcSwapOption<Snapshot>>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<Snapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(_)) => {
                    if let Some(snapshot) = self.source.load_full() {
                        return Poll::Ready(Some(snapshot));
                    }
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;

    fn frame(value: Value) -> Vec<(String, FieldValue)> {
        match value {
            Value::Object(map) => map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            other => panic!("not an object: {other}"),
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<usize>>,
        firsts: Mutex<usize>,
    }

    impl SnapshotObserver for Recorder {
        fn on_snapshot(&self, snapshot: &Arc<Snapshot>) {
            self.seen.lock().unwrap().push(snapshot.len());
        }

        fn on_first_snapshot(&self, _snapshot: &Arc<Snapshot>) {
            *self.firsts.lock().unwrap() += 1;
        }
    }

    #[test]
    fn first_frame_seeds_then_merges() {
        let store = SnapshotStore::new();
        assert!(store.current().is_none());

        store.apply(frame(json!({ "nozzleTemp": 200 })));
        assert_eq!(store.current().unwrap().to_json(), json!({ "nozzleTemp": 200 }));

        store.apply(frame(json!({ "bedTemp0": 60 })));
        assert_eq!(
            store.current().unwrap().to_json(),
            json!({ "nozzleTemp": 200, "bedTemp0": 60 })
        );
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn merge_law_latest_value_per_key_wins() {
        let store = SnapshotStore::new();
        let frames = [
            json!({ "a": 1, "b": 1 }),
            json!({ "b": 2 }),
            json!({ "c": 3, "a": 4 }),
            json!({ "b": null }),
        ];
        for f in frames {
            store.apply(frame(f));
        }
        assert_eq!(
            store.current().unwrap().to_json(),
            json!({ "a": 4, "b": null, "c": 3 })
        );
    }

    #[test]
    fn empty_frame_changes_nothing() {
        let store = SnapshotStore::new();
        let recorder = Arc::new(Recorder::default());
        store.register_observer(recorder.clone());

        assert!(store.apply(Vec::new()).is_none());
        assert_eq!(store.version(), 0);
        assert!(store.last_update().is_none());
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn observers_fire_once_per_mutation() {
        let store = SnapshotStore::new();
        let recorder = Arc::new(Recorder::default());
        let id = store.register_observer(recorder.clone());

        store.apply(frame(json!({ "a": 1 })));
        store.apply(frame(json!({ "b": 2 })));
        assert_eq!(*recorder.seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(*recorder.firsts.lock().unwrap(), 1);

        assert!(store.unregister_observer(id));
        assert!(!store.unregister_observer(id));
        store.apply(frame(json!({ "c": 3 })));
        assert_eq!(recorder.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn last_update_is_stamped() {
        let store = SnapshotStore::new();
        let before = Utc::now();
        store.apply(frame(json!({ "a": 1 })));
        assert!(store.last_update().unwrap() >= before);
    }

    #[tokio::test]
    async fn stream_sees_changes() {
        let store = SnapshotStore::new();
        store.apply(frame(json!({ "a": 1 })));

        let mut sub = store.subscribe();
        assert_eq!(sub.current().unwrap().len(), 1);

        store.apply(frame(json!({ "b": 2 })));
        let next = sub.changed().await.unwrap();
        assert_eq!(next.len(), 2);
        assert_eq!(sub.latest().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn into_stream_yields_new_snapshots() {
        let store = SnapshotStore::new();
        let mut stream = store.subscribe().into_stream();

        store.apply(frame(json!({ "a": 1 })));
        let first = stream.next().await.unwrap();
        assert_eq!(first.to_json(), json!({ "a": 1 }));
    }
}
