//! Add and edit command implementations.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::Args;

use shelf_core::Book;
use shelf_sync::MutationOutcome;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Book record as JSON; `-` reads stdin
    #[arg(long = "json", value_name = "FILE")]
    pub file: PathBuf,
}

pub async fn add(ctx: &Context, args: WriteArgs) -> Result<()> {
    let book = read_book(&args.file)?;

    let outcome = ctx.engine.add(book).await.context("Failed to add book")?;
    report(outcome);
    Ok(())
}

pub async fn edit(ctx: &Context, args: WriteArgs) -> Result<()> {
    let book = read_book(&args.file)?;
    if book.id == 0 {
        bail!("Editing needs the record's \"id\" field");
    }

    let outcome = ctx.engine.edit(book).await.context("Failed to edit book")?;
    report(outcome);
    Ok(())
}

fn report(outcome: MutationOutcome) {
    match outcome {
        MutationOutcome::Saved => output::success("saved"),
        MutationOutcome::Queued => output::warn("saved offline, will retry"),
    }
}

fn read_book(path: &Path) -> Result<Book> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read record from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    parse_book(&text)
}

fn parse_book(text: &str) -> Result<Book> {
    let value: serde_json::Value = serde_json::from_str(text).context("Invalid JSON")?;
    Book::from_value(value).context("Invalid book record")
}
