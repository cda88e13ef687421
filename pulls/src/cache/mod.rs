pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use corelib::{GigId, Pull, PullId, UserId};

pub use memory::InMemoryPullCache;
pub use sqlite::SqlxPullCache;

/// Device-local projection of pulls.
///
/// Never authoritative: the repository overwrites it from remote answers.
/// The only rule a store enforces is storage-level uniqueness of
/// `(gig_id, buyer_id)`; writing a pull that collides on either the id or
/// that pair replaces the colliding record.
#[async_trait]
pub trait PullCache: Send + Sync {
    async fn upsert(&self, pull: &Pull) -> Result<()>;

    /// All-or-nothing batch of [`PullCache::upsert`].
    async fn upsert_many(&self, pulls: &[Pull]) -> Result<()>;

    /// Atomically swaps the whole cache for `pulls`.
    async fn replace_all(&self, pulls: &[Pull]) -> Result<()>;

    async fn get_all(&self) -> Result<Vec<Pull>>;

    async fn get_by_id(&self, id: PullId) -> Result<Option<Pull>>;

    async fn get_by_buyer(&self, buyer_id: UserId) -> Result<Vec<Pull>>;

    async fn find_by_gig_and_buyer(
        &self,
        gig_id: GigId,
        buyer_id: UserId,
    ) -> Result<Option<Pull>>;

    async fn delete_by_id(&self, id: PullId) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    async fn count(&self) -> Result<usize>;
}
