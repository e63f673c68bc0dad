//! `shout query` command.

use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::input::parse_payload;
use crate::opts::GlobalOpts;
use crate::output::print_json;

use super::{control_client, into_result};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Query name, resolved to queries/<name>.sql on each node
    pub name: String,

    /// JSON payload: literal, @file, or @- for stdin
    pub payload: Option<String>,

    /// How long to wait for responses, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

pub async fn cmd_query(opts: &GlobalOpts, args: &QueryArgs) -> Result<()> {
    let payload = args.payload.as_deref().map(parse_payload).transpose()?;
    let mut client = control_client(opts).await?;
    let resp = client
        .query(
            &args.name,
            payload.as_deref(),
            args.timeout_ms.map(Duration::from_millis),
        )
        .await?;
    let result = into_result("query", resp)?;
    print_json(opts, &result["responses"])
}
