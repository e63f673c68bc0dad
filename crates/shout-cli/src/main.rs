mod commands;
mod input;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::event::EventArgs;
use commands::query::QueryArgs;
use commands::run::RunArgs;
use opts::GlobalOpts;

#[derive(Parser, Debug)]
#[command(name = "shout", version, about = "SQL handlers for cluster queries and events")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a node: migrate, join, and dispatch events to SQL handlers
    Run(RunArgs),

    /// Send a query to a running node and print the responses
    Query(QueryArgs),

    /// Send a broadcast event to a running node
    Event(EventArgs),

    /// List the members a running node knows about
    Members,

    /// Ask a running node to leave and shut down
    Leave,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;

    match cli.command {
        Command::Run(args) => commands::run::cmd_run(opts, &args).await,
        Command::Query(args) => commands::query::cmd_query(opts, &args).await,
        Command::Event(args) => commands::event::cmd_event(opts, &args).await,
        Command::Members => commands::members::cmd_members(opts).await,
        Command::Leave => commands::leave::cmd_leave(opts).await,
    }
}
