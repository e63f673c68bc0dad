use anyhow::Result;
use serde_json::Value;

use crate::opts::GlobalOpts;

pub fn print_json(opts: &GlobalOpts, data: &Value) -> Result<()> {
    if opts.pretty {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        println!("{}", serde_json::to_string(data)?);
    }
    Ok(())
}
