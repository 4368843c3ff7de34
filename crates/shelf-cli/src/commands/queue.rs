//! Queue command implementation.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Output as JSON, in the on-disk format
    #[arg(long)]
    pub json: bool,
}

pub fn run(ctx: &Context, args: QueueArgs) -> Result<()> {
    let entries = ctx.queue.all();

    if args.json {
        return output::json(&entries);
    }

    if entries.is_empty() {
        println!("{}", "No pending writes.".dimmed());
        return Ok(());
    }

    for (i, entry) in entries.iter().enumerate() {
        output::queue_entry(i + 1, entry);
    }
    println!();
    println!("{}", format!("{} pending", entries.len()).dimmed());

    Ok(())
}
