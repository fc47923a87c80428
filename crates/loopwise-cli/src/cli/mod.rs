pub mod domain_cmd;
pub mod graph_cmd;
pub mod loop_cmd;
pub mod sync_cmd;

use crate::app_state::AppState;
use crate::config::Config;
use crate::db::SqliteStore;
use crate::error::{LoopError, Result};
use crate::models::Domain;
use crate::remote::RestRemote;
use crate::sync::SyncService;
use dialoguer::Confirm;
use std::sync::Arc;

/// Everything a command needs: configuration, application state and the sync service.
pub struct AppContext {
    pub config: Config,
    pub app: AppState,
    pub sync: Arc<SyncService>,
    store: SqliteStore,
}

impl AppContext {
    pub fn open() -> Result<Self> {
        let config = Config::load()?;
        let capacity = config.storage.capacity_bytes;

        let store = SqliteStore::open(capacity)?;
        let app = AppState::load(&store)?;

        let remote = Arc::new(RestRemote::new(config.remote.clone())?);
        let sync_store = SqliteStore::open(capacity)?;
        let sync = Arc::new(SyncService::new(
            config.sync.clone(),
            remote,
            Box::new(sync_store),
        ));

        Ok(Self {
            config,
            app,
            sync,
            store,
        })
    }

    pub fn save(&mut self) -> Result<()> {
        self.app.save(&mut self.store)
    }

    /// Resolve a domain by id or name.
    pub fn resolve_domain(&self, key: &str) -> Result<Domain> {
        self.app
            .find_domain(key)
            .cloned()
            .ok_or_else(|| LoopError::NotFound(format!("no domain named '{}'", key)))
    }
}

/// Ask before a destructive action unless `yes` was passed.
pub(crate) fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
