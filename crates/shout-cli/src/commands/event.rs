//! `shout event` command.

use anyhow::Result;
use clap::Args;

use crate::input::parse_payload;
use crate::opts::GlobalOpts;
use crate::output::print_json;

use super::{control_client, into_result};

#[derive(Args, Debug)]
pub struct EventArgs {
    /// Event name, resolved to events/<name>.sql on each node
    pub name: String,

    /// JSON payload: literal, @file, or @- for stdin
    pub payload: Option<String>,
}

pub async fn cmd_event(opts: &GlobalOpts, args: &EventArgs) -> Result<()> {
    let payload = args.payload.as_deref().map(parse_payload).transpose()?;
    let mut client = control_client(opts).await?;
    let resp = client.event(&args.name, payload.as_deref()).await?;
    into_result("event", resp)?;
    print_json(opts, &serde_json::json!({ "sent": args.name }))
}
