//! Flush command implementation.

use anyhow::{Context as _, Result, bail};
use clap::Args;
use colored::Colorize;

use shelf_sync::FlushOutcome;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct FlushArgs {}

pub async fn run(ctx: &Context, _args: FlushArgs) -> Result<()> {
    if ctx.queue.is_empty() {
        println!("{}", "Nothing to flush.".dimmed());
        return Ok(());
    }

    eprintln!("{}", "Replaying pending writes...".dimmed());

    match ctx.engine.flush().await.context("Failed to flush")? {
        FlushOutcome::Completed(report) => {
            output::flush_report(&report);
            if report.remaining == 0 {
                output::success("Queue empty");
            }
            Ok(())
        }
        FlushOutcome::AlreadyRunning => bail!("Another flush is already running"),
    }
}
