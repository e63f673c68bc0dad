//! `shout leave` command.

use anyhow::Result;

use crate::opts::GlobalOpts;
use crate::output::print_json;

use super::{control_client, into_result};

pub async fn cmd_leave(opts: &GlobalOpts) -> Result<()> {
    let mut client = control_client(opts).await?;
    into_result("leave", client.leave().await?)?;
    print_json(opts, &serde_json::json!({ "left": true }))
}
