//! CLI command handlers.

pub mod event;
pub mod leave;
pub mod members;
pub mod query;
pub mod run;

use anyhow::{Context, Result};
use serde_json::Value;
use shout_node::{ControlClient, ResponseEnvelope};

use crate::opts::GlobalOpts;

/// Connect to the node named by `--rpc-addr`.
pub async fn control_client(opts: &GlobalOpts) -> Result<ControlClient> {
    let addr = opts.dial_addr();
    ControlClient::connect(&addr)
        .await
        .with_context(|| format!("no node reachable at {addr}"))
}

/// Unwrap a control response, turning an error envelope into an error.
pub fn into_result(cmd: &str, resp: ResponseEnvelope) -> Result<Value> {
    if !resp.ok {
        match resp.error {
            Some(err) => anyhow::bail!("{cmd} failed: {err}"),
            None => anyhow::bail!("{cmd} failed"),
        }
    }
    Ok(resp.result.unwrap_or(Value::Null))
}
