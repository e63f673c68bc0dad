//! `shout run` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use shout_node::config::{
    DEFAULT_DB_PATH, DEFAULT_HANDLERS_PATH, DEFAULT_MEMBERLIST_PORT, DEFAULT_MIGRATIONS_SOURCE,
    default_node_name,
};
use shout_node::{LocalAgent, Membership, Node, NodeConfig};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use crate::opts::GlobalOpts;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// SQLite database file (env: SHOUT_DB)
    #[arg(long, env = "SHOUT_DB", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Advertised cluster port (env: SHOUT_MEMBERLIST_PORT)
    #[arg(long, env = "SHOUT_MEMBERLIST_PORT", default_value_t = DEFAULT_MEMBERLIST_PORT)]
    pub memberlist_port: u16,

    /// Node name, defaults to the host name (env: SHOUT_NODE)
    #[arg(long, env = "SHOUT_NODE")]
    pub node: Option<String>,

    /// Directory holding queries/ and events/ handler files (env: SHOUT_HANDLERS)
    #[arg(long, env = "SHOUT_HANDLERS", default_value = DEFAULT_HANDLERS_PATH)]
    pub handlers: PathBuf,

    /// Migration source, file://<dir> (env: SHOUT_MIGRATIONS)
    #[arg(long, env = "SHOUT_MIGRATIONS", default_value = DEFAULT_MIGRATIONS_SOURCE)]
    pub migrations: String,

    /// Maximum open database connections
    #[arg(long, default_value_t = 4)]
    pub pool_size: usize,

    /// How long a control-plane query waits for replies, in milliseconds
    #[arg(long, default_value_t = 15_000)]
    pub query_timeout_ms: u64,
}

impl RunArgs {
    fn to_config(&self, opts: &GlobalOpts) -> NodeConfig {
        NodeConfig {
            node_name: self.node.clone().unwrap_or_else(default_node_name),
            db_path: self.db.clone(),
            rpc_addr: opts.rpc_addr.clone(),
            memberlist_port: self.memberlist_port,
            handlers_path: self.handlers.clone(),
            migrations_source: self.migrations.clone(),
            pool_size: self.pool_size,
            query_timeout: Duration::from_millis(self.query_timeout_ms),
            ..NodeConfig::default()
        }
    }
}

pub async fn cmd_run(opts: &GlobalOpts, args: &RunArgs) -> Result<()> {
    setup_logging(&opts.log_level);

    let config = args.to_config(opts);
    let node = Node::new(config.clone())
        .with_context(|| format!("open database {}", config.db_path.display()))?;
    let agent = LocalAgent::new(&config);
    spawn_signal_handler(agent.shutdown_handle());

    node.run_with(agent).await.context("node failed")?;
    Ok(())
}

/// Fire the shutdown signal on Ctrl-C or SIGTERM.
fn spawn_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        let mut term =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down...");
            }
            _ = async {
                if let Some(ref mut t) = term { t.recv().await; }
            } => {
                tracing::info!("SIGTERM received, shutting down...");
            }
        }
        let _ = shutdown_tx.send(());
    });
}

/// `RUST_LOG` wins over `--log-level`.
fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}
