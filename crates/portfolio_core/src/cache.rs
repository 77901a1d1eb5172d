//! crates/portfolio_core/src/cache.rs
//!
//! Single-slot cache for the full roster. The slot holds either nothing or one
//! complete snapshot; a refresh replaces the snapshot wholesale and nothing
//! patches it in place.
//!
//! Concurrent `get` calls on an empty slot may each fetch. Reads are idempotent
//! and volume is low, so there is no single-flight guard. A fetch that was
//! started before an `invalidate` never stores its result, so a read issued
//! after a write cannot be served the pre-write roster.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::domain::StudentRecord;
use crate::ports::{PortResult, StudentGateway};

/// An immutable roster snapshot, shared by reference.
pub type Snapshot = Arc<Vec<StudentRecord>>;

#[derive(Default)]
struct Slot {
    generation: u64,
    snapshot: Option<Snapshot>,
}

pub struct StudentCache {
    gateway: Arc<dyn StudentGateway>,
    slot: RwLock<Slot>,
}

impl StudentCache {
    pub fn new(gateway: Arc<dyn StudentGateway>) -> Self {
        Self {
            gateway,
            slot: RwLock::new(Slot::default()),
        }
    }

    /// Returns the held snapshot, fetching it first when the slot is empty.
    /// A failed fetch leaves the slot empty.
    pub async fn get(&self) -> PortResult<Snapshot> {
        let generation = {
            let slot = self.slot.read().await;
            if let Some(snapshot) = &slot.snapshot {
                debug!(students = snapshot.len(), "Roster cache hit");
                return Ok(snapshot.clone());
            }
            slot.generation
        };

        debug!("Roster cache miss, fetching");
        let students = self.gateway.fetch_all().await?;
        warn_on_duplicate_ids(&students);
        let snapshot: Snapshot = Arc::new(students);

        let mut slot = self.slot.write().await;
        if slot.generation == generation {
            slot.snapshot = Some(snapshot.clone());
        } else {
            debug!("Roster was invalidated during fetch; not storing it");
        }
        Ok(snapshot)
    }

    /// Drops the held snapshot so the next `get` refetches.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        slot.generation += 1;
        slot.snapshot = None;
        debug!(generation = slot.generation, "Roster cache invalidated");
    }

    /// Finds one student in the (possibly freshly fetched) snapshot.
    pub async fn lookup(&self, id: &str) -> PortResult<Option<StudentRecord>> {
        let snapshot = self.get().await?;
        Ok(snapshot.iter().find(|s| s.id == id).cloned())
    }
}

fn warn_on_duplicate_ids(students: &[StudentRecord]) {
    let mut seen = HashSet::new();
    for student in students {
        if !seen.insert(student.id.as_str()) {
            warn!(id = %student.id, "Duplicate student id in roster");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, MutationResult};
    use crate::ports::PortError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A gateway that serves a scripted sequence of fetch results and counts calls.
    struct ScriptedGateway {
        responses: Mutex<Vec<PortResult<Vec<StudentRecord>>>>,
        fetches: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(mut responses: Vec<PortResult<Vec<StudentRecord>>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                fetches: AtomicUsize::new(0),
            })
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StudentGateway for ScriptedGateway {
        async fn fetch_all(&self) -> PortResult<Vec<StudentRecord>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(PortError::Network("script exhausted".to_string())))
        }

        async fn mutate(&self, _action: Action) -> MutationResult {
            MutationResult::failed("not used")
        }
    }

    fn student(id: &str) -> StudentRecord {
        StudentRecord {
            id: id.to_string(),
            name: id.to_uppercase(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn second_get_is_served_from_the_slot() {
        let gateway = ScriptedGateway::new(vec![Ok(vec![student("a"), student("b")])]);
        let cache = StudentCache::new(gateway.clone());

        let first = cache.get().await.unwrap();
        let second = cache.get().await.unwrap();

        assert_eq!(gateway.fetches(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_fetch() {
        let gateway = ScriptedGateway::new(vec![
            Ok(vec![student("a")]),
            Ok(vec![student("a"), student("b")]),
        ]);
        let cache = StudentCache::new(gateway.clone());

        assert_eq!(cache.get().await.unwrap().len(), 1);
        cache.invalidate().await;
        assert_eq!(cache.get().await.unwrap().len(), 2);
        assert_eq!(gateway.fetches(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let gateway = ScriptedGateway::new(vec![
            Err(PortError::Api("quota exceeded".to_string())),
            Ok(vec![student("a")]),
        ]);
        let cache = StudentCache::new(gateway.clone());

        let err = cache.get().await.unwrap_err();
        assert_eq!(err, PortError::Api("quota exceeded".to_string()));
        assert_eq!(cache.get().await.unwrap().len(), 1);
        assert_eq!(gateway.fetches(), 2);
    }

    #[tokio::test]
    async fn lookup_scans_the_snapshot() {
        let gateway = ScriptedGateway::new(vec![Ok(vec![student("a"), student("b")])]);
        let cache = StudentCache::new(gateway.clone());

        assert_eq!(cache.lookup("b").await.unwrap().map(|s| s.name), Some("B".to_string()));
        assert_eq!(cache.lookup("zzz").await.unwrap(), None);
        assert_eq!(gateway.fetches(), 1);
    }

    /// A gateway whose fetch blocks until released, to interleave an invalidate.
    struct GatedGateway {
        release: tokio::sync::Notify,
        started: tokio::sync::Notify,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl StudentGateway for GatedGateway {
        async fn fetch_all(&self) -> PortResult<Vec<StudentRecord>> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                self.started.notify_one();
                self.release.notified().await;
                return Ok(vec![student("stale")]);
            }
            Ok(vec![student("fresh")])
        }

        async fn mutate(&self, _action: Action) -> MutationResult {
            MutationResult::failed("not used")
        }
    }

    #[tokio::test]
    async fn fetch_overtaken_by_invalidate_is_not_stored() {
        let gateway = Arc::new(GatedGateway {
            release: tokio::sync::Notify::new(),
            started: tokio::sync::Notify::new(),
            fetches: AtomicUsize::new(0),
        });
        let cache = Arc::new(StudentCache::new(gateway.clone()));

        let reader = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get().await })
        };
        gateway.started.notified().await;
        cache.invalidate().await;
        gateway.release.notify_one();

        let stale = reader.await.unwrap().unwrap();
        assert_eq!(stale[0].id, "stale");

        let next = cache.get().await.unwrap();
        assert_eq!(next[0].id, "fresh");
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 2);
    }
}
