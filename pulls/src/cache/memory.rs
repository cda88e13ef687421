use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use corelib::{GigId, Pull, PullId, UserId};
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::cache::PullCache;

#[derive(Default)]
struct Inner {
    /// Records by id; ordered so listings are stable.
    by_id: BTreeMap<PullId, Pull>,
    /// Uniqueness index over (gig, buyer).
    by_pair: HashMap<(GigId, UserId), PullId>,
}

impl Inner {
    fn remove(&mut self, id: PullId) -> Option<Pull> {
        let old = self.by_id.remove(&id)?;
        self.by_pair.remove(&(old.gig_id, old.buyer_id));
        Some(old)
    }

    /// Same eviction rule as SQLite `INSERT OR REPLACE`.
    fn upsert(&mut self, pull: Pull) {
        self.remove(pull.id);
        if let Some(holder) = self.by_pair.get(&(pull.gig_id, pull.buyer_id)).copied() {
            self.remove(holder);
            debug!(evicted_id = holder, "pair collision; evicted cached pull");
        }

        self.by_pair.insert((pull.gig_id, pull.buyer_id), pull.id);
        self.by_id.insert(pull.id, pull);
    }
}

/// Process-local pull cache with the same replace semantics as
/// [`crate::cache::SqlxPullCache`]. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryPullCache {
    inner: Mutex<Inner>,
}

impl InMemoryPullCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PullCache for InMemoryPullCache {
    async fn upsert(&self, pull: &Pull) -> anyhow::Result<()> {
        self.inner.lock().upsert(pull.clone());
        Ok(())
    }

    async fn upsert_many(&self, pulls: &[Pull]) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        for p in pulls {
            inner.upsert(p.clone());
        }
        Ok(())
    }

    #[instrument(skip(self, pulls), target = "cache", fields(count = pulls.len()))]
    async fn replace_all(&self, pulls: &[Pull]) -> anyhow::Result<()> {
        let mut fresh = Inner::default();
        for p in pulls {
            fresh.upsert(p.clone());
        }
        *self.inner.lock() = fresh;
        Ok(())
    }

    async fn get_all(&self) -> anyhow::Result<Vec<Pull>> {
        Ok(self.inner.lock().by_id.values().cloned().collect())
    }

    async fn get_by_id(&self, id: PullId) -> anyhow::Result<Option<Pull>> {
        Ok(self.inner.lock().by_id.get(&id).cloned())
    }

    async fn get_by_buyer(&self, buyer_id: UserId) -> anyhow::Result<Vec<Pull>> {
        Ok(self
            .inner
            .lock()
            .by_id
            .values()
            .filter(|p| p.buyer_id == buyer_id)
            .cloned()
            .collect())
    }

    async fn find_by_gig_and_buyer(
        &self,
        gig_id: GigId,
        buyer_id: UserId,
    ) -> anyhow::Result<Option<Pull>> {
        let inner = self.inner.lock();
        Ok(inner
            .by_pair
            .get(&(gig_id, buyer_id))
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn delete_by_id(&self, id: PullId) -> anyhow::Result<()> {
        self.inner.lock().remove(id);
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        *self.inner.lock() = Inner::default();
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<usize> {
        Ok(self.inner.lock().by_id.len())
    }
}
