//! Serialized event cache.
//!
//! Every write is a read-modify-write of the whole record, so writes are
//! funnelled through a single FIFO queue drained one item at a time. Reads
//! wait for the most recently registered write before loading, which gives
//! read-after-write consistency for every write requested before the read.
//!
//! Both [`EventCache::set`] and the read methods register with the queue when
//! they are *called*, not when the returned future is first polled.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::event::{EventType, TelemetryEvent};
use super::store::{CacheEntry, CacheRecord, CacheStore};
use super::{CacheError, CacheResult};

type Completion = Shared<BoxFuture<'static, ()>>;

struct PendingWrite {
    event_type: EventType,
    body: TelemetryEvent,
    reply: oneshot::Sender<CacheResult<()>>,
    done: oneshot::Sender<()>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PendingWrite>,
    processing: bool,
    current: Option<Completion>,
}

struct Inner {
    store: Arc<dyn CacheStore>,
    state: Mutex<QueueState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn apply(&self, event_type: EventType, body: TelemetryEvent) -> CacheResult<()> {
        let mut record = self.store.load().await?;
        record.insert(
            event_type,
            CacheEntry {
                timestamp: Utc::now().timestamp_millis(),
                body,
            },
        );
        self.store.save(&record).await
    }
}

/// Event cache whose writes are applied strictly one at a time.
///
/// Cloning is cheap and every clone shares the same queue.
#[derive(Clone)]
pub struct EventCache {
    inner: Arc<Inner>,
}

impl EventCache {
    /// Create a cache over `store`.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Record `body` as the latest `event_type`.
    ///
    /// The write is queued immediately. The returned future resolves once
    /// this write has been applied, and fails only if this write failed.
    /// Must be called within a Tokio runtime.
    pub fn set(
        &self,
        event_type: EventType,
        body: TelemetryEvent,
    ) -> impl Future<Output = CacheResult<()>> + Send + 'static {
        let (reply_tx, reply_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        let start_drain = {
            let mut state = self.inner.state();
            state.pending.push_back(PendingWrite {
                event_type,
                body,
                reply: reply_tx,
                done: done_tx,
            });
            state.current = Some(done_rx.map(|_| ()).boxed().shared());
            !std::mem::replace(&mut state.processing, true)
        };

        if start_drain {
            tokio::spawn(drain(Arc::clone(&self.inner)));
        }

        async move {
            reply_rx
                .await
                .unwrap_or_else(|_| Err(CacheError::QueueClosed))
        }
    }

    /// The latest entry for `event_type`, after pending writes are applied.
    pub fn get(
        &self,
        event_type: EventType,
    ) -> impl Future<Output = CacheResult<Option<CacheEntry>>> + Send + 'static {
        let all = self.get_all();
        async move { Ok(all.await?.remove(&event_type)) }
    }

    /// The whole record, after pending writes are applied.
    pub fn get_all(&self) -> impl Future<Output = CacheResult<CacheRecord>> + Send + 'static {
        let pending = self.inner.state().current.clone();
        let inner = Arc::clone(&self.inner);
        async move {
            if let Some(pending) = pending {
                pending.await;
            }
            inner.store.load().await
        }
    }

    /// The most recent init or upgrade, unless an action happened after it.
    pub fn preceding_upgrade(
        &self,
    ) -> impl Future<Output = CacheResult<Option<UpgradeInfo>>> + Send + 'static {
        let all = self.get_all();
        async move { Ok(preceding_upgrade(&all.await?)) }
    }
}

async fn drain(inner: Arc<Inner>) {
    loop {
        let next = {
            let mut state = inner.state();
            match state.pending.pop_front() {
                Some(next) => next,
                None => {
                    state.processing = false;
                    return;
                }
            }
        };

        let event_type = next.event_type;
        let result = inner.apply(event_type, next.body).await;
        match &result {
            Ok(()) => debug!(event = %event_type, "event cache updated"),
            Err(e) => warn!(event = %event_type, error = %e, "event cache write failed"),
        }

        let _ = next.reply.send(result);
        let _ = next.done.send(());
    }
}

/// Identity of the upgrade that preceded the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeInfo {
    pub timestamp: i64,
    pub event_type: EventType,
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

const UPGRADE_EVENTS: [EventType; 2] = [EventType::Init, EventType::Upgrade];
const ACTION_EVENTS: [EventType; 3] = [EventType::Build, EventType::Dev, EventType::Error];

fn latest<'a>(record: &'a CacheRecord, events: &[EventType]) -> Option<&'a CacheEntry> {
    events
        .iter()
        .filter_map(|event| record.get(event))
        .max_by_key(|entry| entry.timestamp)
}

/// The latest init or upgrade in `record`, unless a build, dev or error
/// event was recorded after it.
pub fn preceding_upgrade(record: &CacheRecord) -> Option<UpgradeInfo> {
    let upgrade = latest(record, &UPGRADE_EVENTS)?;
    if latest(record, &ACTION_EVENTS).is_some_and(|action| action.timestamp > upgrade.timestamp) {
        return None;
    }

    Some(UpgradeInfo {
        timestamp: upgrade.timestamp,
        event_type: upgrade.body.event_type,
        event_id: upgrade.body.event_id.clone(),
        session_id: upgrade.body.session_id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::store::{FileCacheStore, MemoryCacheStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn event(event_type: EventType) -> TelemetryEvent {
        TelemetryEvent::new(event_type, json!({"n": 1}))
    }

    fn entry(event_type: EventType, timestamp: i64) -> CacheEntry {
        CacheEntry {
            timestamp,
            body: event(event_type).with_session_id(format!("session-{timestamp}")),
        }
    }

    /// Fails every save whose call number is listed.
    struct FlakyStore {
        inner: MemoryCacheStore,
        saves: AtomicUsize,
        fail_on: Vec<usize>,
    }

    #[async_trait]
    impl CacheStore for FlakyStore {
        async fn load(&self) -> CacheResult<CacheRecord> {
            self.inner.load().await
        }

        async fn save(&self, record: &CacheRecord) -> CacheResult<()> {
            let n = self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&n) {
                return Err(CacheError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.inner.save(record).await
        }
    }

    #[tokio::test]
    async fn test_read_after_write_without_ordering_awaits() {
        let cache = EventCache::new(Arc::new(MemoryCacheStore::new()));
        let body = event(EventType::Upgrade);

        let (written, read) = tokio::join!(
            cache.set(EventType::Upgrade, body.clone()),
            cache.get_all()
        );

        assert_ok!(written);
        let record = assert_ok!(read);
        assert_eq!(record.get(&EventType::Upgrade).map(|e| &e.body), Some(&body));
    }

    #[tokio::test]
    async fn test_concurrent_sets_are_not_lost() {
        let temp_dir = TempDir::new().expect("temp dir");
        let store = FileCacheStore::new(temp_dir.path().join("cache.json"));
        let cache = EventCache::new(Arc::new(store));

        let (a, b, c) = tokio::join!(
            cache.set(EventType::Init, event(EventType::Init)),
            cache.set(EventType::Dev, event(EventType::Dev)),
            cache.set(EventType::Build, event(EventType::Build)),
        );
        assert_ok!(a);
        assert_ok!(b);
        assert_ok!(c);

        let record = assert_ok!(cache.get_all().await);
        assert_eq!(record.len(), 3);
        for key in [EventType::Init, EventType::Dev, EventType::Build] {
            assert!(record.contains_key(&key), "{key} missing");
        }
    }

    #[tokio::test]
    async fn test_sets_from_clones_share_the_queue() {
        let cache = EventCache::new(Arc::new(MemoryCacheStore::new()));
        let handles: Vec<_> = EventType::ALL
            .iter()
            .map(|event_type| {
                let cache = cache.clone();
                let event_type = *event_type;
                tokio::spawn(async move { cache.set(event_type, event(event_type)).await })
            })
            .collect();
        for handle in handles {
            assert_ok!(handle.await.expect("join"));
        }

        let record = assert_ok!(cache.get_all().await);
        assert_eq!(record.len(), EventType::ALL.len());
    }

    #[tokio::test]
    async fn test_failed_write_rejects_only_its_caller() {
        let cache = EventCache::new(Arc::new(FlakyStore {
            inner: MemoryCacheStore::new(),
            saves: AtomicUsize::new(0),
            fail_on: vec![1],
        }));

        let first = cache.set(EventType::Init, event(EventType::Init));
        let second = cache.set(EventType::Dev, event(EventType::Dev));
        let third = cache.set(EventType::Build, event(EventType::Build));
        let (first, second, third) = tokio::join!(first, second, third);

        assert_ok!(first);
        assert_err!(second);
        assert_ok!(third);

        let record = assert_ok!(cache.get_all().await);
        assert!(record.contains_key(&EventType::Init));
        assert!(!record.contains_key(&EventType::Dev));
        assert!(record.contains_key(&EventType::Build));
    }

    #[tokio::test]
    async fn test_get_single_entry() {
        let cache = EventCache::new(Arc::new(MemoryCacheStore::new()));
        let body = event(EventType::GhostStories);
        let _ = cache.set(EventType::GhostStories, body.clone());

        let entry = assert_ok!(cache.get(EventType::GhostStories).await).expect("entry");
        assert_eq!(entry.body, body);
        assert!(entry.timestamp > 0);
        assert!(assert_ok!(cache.get(EventType::Boot).await).is_none());
    }

    #[tokio::test]
    async fn test_read_with_no_writes() {
        let cache = EventCache::new(Arc::new(MemoryCacheStore::new()));
        assert!(assert_ok!(cache.get_all().await).is_empty());
    }

    #[test]
    fn test_preceding_upgrade_picks_latest() {
        let mut record = CacheRecord::new();
        record.insert(EventType::Init, entry(EventType::Init, 100));
        record.insert(EventType::Upgrade, entry(EventType::Upgrade, 200));
        record.insert(EventType::Dev, entry(EventType::Dev, 150));

        let info = preceding_upgrade(&record).expect("upgrade");
        assert_eq!(info.event_type, EventType::Upgrade);
        assert_eq!(info.timestamp, 200);
        assert_eq!(info.session_id.as_deref(), Some("session-200"));
    }

    #[test]
    fn test_preceding_upgrade_hidden_by_later_action() {
        let mut record = CacheRecord::new();
        record.insert(EventType::Init, entry(EventType::Init, 100));
        record.insert(EventType::Build, entry(EventType::Build, 300));
        assert!(preceding_upgrade(&record).is_none());

        record.insert(EventType::Upgrade, entry(EventType::Upgrade, 400));
        assert_eq!(
            preceding_upgrade(&record).map(|i| i.event_type),
            Some(EventType::Upgrade)
        );
    }

    #[test]
    fn test_preceding_upgrade_requires_upgrade_event() {
        let mut record = CacheRecord::new();
        record.insert(EventType::Dev, entry(EventType::Dev, 100));
        assert!(preceding_upgrade(&record).is_none());
        assert!(preceding_upgrade(&CacheRecord::new()).is_none());
    }

    #[tokio::test]
    async fn test_preceding_upgrade_through_cache() {
        let mut seeded = CacheRecord::new();
        seeded.insert(EventType::Init, entry(EventType::Init, 1));
        let cache = EventCache::new(Arc::new(MemoryCacheStore::with_record(seeded)));

        let info = assert_ok!(cache.preceding_upgrade().await).expect("upgrade");
        assert_eq!(info.event_type, EventType::Init);

        assert_ok!(cache.set(EventType::Dev, event(EventType::Dev)).await);
        assert!(assert_ok!(cache.preceding_upgrade().await).is_none());
    }
}
