use anyhow::Context;
use async_trait::async_trait;
use corelib::{GigId, Price, Pull, PullId, PullState, UserId};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument, warn};

use crate::cache::PullCache;

const SELECT_PULLS: &str = r#"
SELECT id, seller_id, buyer_id, gig_id, price_init_minor, price_update_minor, state
FROM pulls
"#;

// REPLACE also evicts a row holding the same (gig_id, buyer_id) under another id.
const UPSERT_PULL: &str = r#"
INSERT OR REPLACE INTO pulls (
  id, seller_id, buyer_id, gig_id, price_init_minor, price_update_minor, state
)
VALUES (?, ?, ?, ?, ?, ?, ?);
"#;

/// SQLx-backed pull cache.
/// Responsible only for persistence and row mapping.
pub struct SqlxPullCache {
    pool: SqlitePool,
}

impl SqlxPullCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, sql: String, binds: &[i64]) -> anyhow::Result<Vec<Pull>> {
        let mut q = sqlx::query(&sql);
        for b in binds {
            q = q.bind(*b);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            match row_to_pull(&r) {
                Ok(p) => out.push(p),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the read
                    warn!(error = %e, "skipping malformed pull row");
                }
            }
        }
        Ok(out)
    }
}

async fn upsert_in(tx: &mut Transaction<'_, Sqlite>, pull: &Pull) -> anyhow::Result<()> {
    sqlx::query(UPSERT_PULL)
        .bind(pull.id)
        .bind(pull.seller_id)
        .bind(pull.buyer_id)
        .bind(pull.gig_id)
        .bind(pull.price_init.minor())
        .bind(pull.price_update.minor())
        .bind(pull.state.encode())
        .execute(&mut **tx)
        .await
        .with_context(|| format!("failed to upsert pull {}", pull.id))?;
    Ok(())
}

#[async_trait]
impl PullCache for SqlxPullCache {
    #[instrument(skip(self, pull), target = "cache", fields(pull_id = pull.id))]
    async fn upsert(&self, pull: &Pull) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        upsert_in(&mut tx, pull).await?;
        tx.commit().await?;

        debug!("pull cached");
        Ok(())
    }

    #[instrument(skip(self, pulls), target = "cache", fields(count = pulls.len()))]
    async fn upsert_many(&self, pulls: &[Pull]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        for p in pulls {
            // dropping the transaction on error rolls the whole batch back
            upsert_in(&mut tx, p).await?;
        }
        tx.commit().await?;

        debug!("pull batch cached");
        Ok(())
    }

    #[instrument(skip(self, pulls), target = "cache", fields(count = pulls.len()))]
    async fn replace_all(&self, pulls: &[Pull]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM pulls;")
            .execute(&mut *tx)
            .await
            .context("failed to clear pulls")?;
        for p in pulls {
            upsert_in(&mut tx, p).await?;
        }
        tx.commit().await?;

        debug!("pull cache replaced");
        Ok(())
    }

    async fn get_all(&self) -> anyhow::Result<Vec<Pull>> {
        self.fetch(format!("{SELECT_PULLS} ORDER BY id;"), &[]).await
    }

    async fn get_by_id(&self, id: PullId) -> anyhow::Result<Option<Pull>> {
        let rows = self
            .fetch(format!("{SELECT_PULLS} WHERE id = ?;"), &[id])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn get_by_buyer(&self, buyer_id: UserId) -> anyhow::Result<Vec<Pull>> {
        self.fetch(
            format!("{SELECT_PULLS} WHERE buyer_id = ? ORDER BY id;"),
            &[buyer_id],
        )
        .await
    }

    async fn find_by_gig_and_buyer(
        &self,
        gig_id: GigId,
        buyer_id: UserId,
    ) -> anyhow::Result<Option<Pull>> {
        let rows = self
            .fetch(
                format!("{SELECT_PULLS} WHERE gig_id = ? AND buyer_id = ? LIMIT 1;"),
                &[gig_id, buyer_id],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self), target = "cache")]
    async fn delete_by_id(&self, id: PullId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM pulls WHERE id = ?;")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), target = "cache")]
    async fn clear(&self) -> anyhow::Result<()> {
        let done = sqlx::query("DELETE FROM pulls;")
            .execute(&self.pool)
            .await?;

        debug!(count = done.rows_affected(), "pull cache cleared");
        Ok(())
    }

    async fn count(&self) -> anyhow::Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM pulls;")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(usize::try_from(n).unwrap_or_default())
    }
}

/* =========================
Row mapping
========================= */

fn row_to_pull(r: &SqliteRow) -> anyhow::Result<Pull> {
    let state: String = r.try_get("state").context("invalid state column")?;

    Ok(Pull {
        id: r.try_get("id")?,
        seller_id: r.try_get("seller_id")?,
        buyer_id: r.try_get("buyer_id")?,
        gig_id: r.try_get("gig_id")?,
        price_init: Price::from_minor(r.try_get("price_init_minor")?),
        price_update: Price::from_minor(r.try_get("price_update_minor")?),
        state: PullState::decode(&state),
    })
}
