//! Node bootstrap: database, migrations, membership, dispatch loop.

use shout_db::{Database, MigrateOutcome};

use crate::config::NodeConfig;
use crate::daemon::{DispatchLoop, DispatchStats};
use crate::dispatch::Dispatcher;
use crate::error::NodeError;
use crate::membership::{LocalAgent, Membership};

pub struct Node {
    config: NodeConfig,
    db: Database,
}

impl Node {
    /// Open the database. Failing here is fatal for the process.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let db = Database::open(&config.db_path, config.pool_size, config.busy_timeout)?;
        Ok(Self { config, db })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run with the single-node control-plane agent.
    pub async fn run(self) -> Result<DispatchStats, NodeError> {
        let agent = LocalAgent::new(&self.config);
        self.run_with(agent).await
    }

    /// Migrate, start `membership`, and run the dispatch loop until shutdown.
    pub async fn run_with<M: Membership>(
        self,
        mut membership: M,
    ) -> Result<DispatchStats, NodeError> {
        let config = &self.config;
        tracing::info!(
            node = %config.node_name,
            db = %config.db_path.display(),
            rpc_addr = %config.rpc_addr,
            handlers = %config.handlers_path.display(),
            migrations = %config.migrations_source,
            "starting node"
        );

        match shout_db::migrate(&self.db, &config.migrations_source)? {
            MigrateOutcome::NoChange { version } => {
                tracing::info!(?version, "schema is up to date");
            }
            MigrateOutcome::Applied { from, to, count } => {
                tracing::info!(?from, to, count, "applied migrations");
            }
        }

        let subscription = membership.start().await?;
        let dispatcher = Dispatcher::new(config.handlers_path.clone(), self.db.clone());
        let mut dispatch_loop = DispatchLoop::new(dispatcher, subscription);
        let stats = dispatch_loop.run().await;

        membership.stop().await;
        tracing::info!(
            processed = stats.processed,
            dropped = stats.dropped,
            "node stopped"
        );
        Ok(stats)
    }
}
