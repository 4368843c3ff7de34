//! Per-invocation wiring of config, remote, session and queue.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};

use shelf_core::ServerUrl;
use shelf_core::traits::Remote;
use shelf_http::HttpRemote;
use shelf_sync::{
    AuthSession, FileQueueStorage, MutationQueue, ReconciliationEngine, SyncConfig, TokenStore,
};

use crate::cli::Cli;

/// Everything a command needs, built from the global flags.
pub struct Context {
    pub config: SyncConfig,
    pub remote: Arc<dyn Remote>,
    pub auth: AuthSession,
    pub queue: Arc<MutationQueue>,
    pub engine: Arc<ReconciliationEngine>,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = config_from_cli(cli)?;

        let remote: Arc<dyn Remote> = Arc::new(
            HttpRemote::new(config.server.clone(), config.request_timeout)
                .context("Failed to create HTTP client")?,
        );

        let queue = Arc::new(
            MutationQueue::open(FileQueueStorage::new(config.queue_path()))
                .context("Failed to open pending-write queue")?,
        );
        let auth = AuthSession::new(remote.clone(), TokenStore::new(config.session_path()))
            .context("Failed to load session")?;
        let engine = Arc::new(ReconciliationEngine::new(
            remote.clone(),
            queue.clone(),
            auth.clone(),
        ));

        Ok(Self {
            config,
            remote,
            auth,
            queue,
            engine,
        })
    }
}

fn config_from_cli(cli: &Cli) -> Result<SyncConfig> {
    let mut config = match &cli.data_dir {
        Some(dir) => SyncConfig::new(dir),
        None => SyncConfig::with_default_dir().context("Failed to resolve data directory")?,
    };

    if let Some(server) = &cli.server {
        let server = ServerUrl::new(server).context("Invalid --server URL")?;
        config = config.with_server(server);
    }

    Ok(config.with_retry_interval(cli.retry_interval.map(Duration::from_secs)))
}
