//! `shout members` command.

use anyhow::Result;

use crate::opts::GlobalOpts;
use crate::output::print_json;

use super::{control_client, into_result};

pub async fn cmd_members(opts: &GlobalOpts) -> Result<()> {
    let mut client = control_client(opts).await?;
    let result = into_result("members", client.members().await?)?;
    print_json(opts, &result["members"])
}
