//! Options shared by every subcommand.

use clap::Args;
use shout_node::config::DEFAULT_RPC_ADDR;

#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Control-plane address of the node (env: SHOUT_RPC_ADDR)
    #[arg(long, global = true, env = "SHOUT_RPC_ADDR", default_value = DEFAULT_RPC_ADDR)]
    pub rpc_addr: String,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log filter when RUST_LOG is unset (env: SHOUT_LOG_LEVEL)
    #[arg(long, global = true, env = "SHOUT_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl GlobalOpts {
    /// Address a client should dial. A wildcard listen address maps to loopback.
    pub fn dial_addr(&self) -> String {
        match self.rpc_addr.strip_prefix("0.0.0.0:") {
            Some(port) => format!("127.0.0.1:{port}"),
            None => self.rpc_addr.clone(),
        }
    }
}
