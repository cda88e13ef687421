use sqlx::SqlitePool;

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Pulls: a projection of remote truth, freely overwritten.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS pulls (
  id INTEGER PRIMARY KEY NOT NULL,
  seller_id INTEGER NOT NULL,
  buyer_id INTEGER NOT NULL,
  gig_id INTEGER NOT NULL,
  price_init_minor INTEGER NOT NULL,
  price_update_minor INTEGER NOT NULL,
  state TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // One pull per (gig, buyer).
    sqlx::query(
        r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_pulls_gig_buyer ON pulls(gig_id, buyer_id);"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_pulls_buyer ON pulls(buyer_id);"#)
        .execute(pool)
        .await?;

    // Signed-in user; the session is whichever row exists.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS users (
  email TEXT PRIMARY KEY NOT NULL,
  token TEXT
);
"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
