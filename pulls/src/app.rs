//! Wiring of the production stack: SQLite cache and session, HTTP gateway,
//! repository and view-model.

use std::sync::Arc;

use anyhow::Context;
use common::logger::{LogFormat, init_logger};
use tracing::info;

use crate::cache::SqlxPullCache;
use crate::config::PullsConfig;
use crate::db::Db;
use crate::remote::HttpPullGateway;
use crate::repository::PullRepository;
use crate::session::SqlxSessionStore;
use crate::view_model::PullViewModel;

pub const SERVICE_NAME: &str = "gigu-pulls";

/// Everything the UI layer needs, built from one config.
pub struct PullsApp {
    pub db: Db,
    pub session: Arc<SqlxSessionStore>,
    pub repository: Arc<PullRepository>,
}

impl PullsApp {
    pub fn view_model(&self) -> PullViewModel {
        PullViewModel::new(Arc::clone(&self.repository))
    }
}

/// Installs logging, opens and migrates the local database, and assembles
/// the repository over the HTTP gateway.
pub async fn bootstrap(cfg: &PullsConfig) -> anyhow::Result<PullsApp> {
    init_logger(SERVICE_NAME, LogFormat::for_env(&cfg.app_env));

    let db = Db::connect(&cfg.database_url, cfg.db_max_connections).await?;
    db.migrate().await?;

    let gateway =
        HttpPullGateway::from_config(cfg).context("failed to build pull gateway client")?;
    info!(endpoint = gateway.url(), "pull gateway ready");

    let session = Arc::new(SqlxSessionStore::new(db.pool.clone()));
    let cache = Arc::new(SqlxPullCache::new(db.pool.clone()));

    let repository = Arc::new(
        PullRepository::new(Arc::new(gateway), cache, session.clone())
            .with_slow_call_threshold(cfg.slow_call_threshold),
    );

    Ok(PullsApp {
        db,
        session,
        repository,
    })
}
