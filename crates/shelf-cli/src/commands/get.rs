//! Get command implementation.

use anyhow::{Context as _, Result};
use clap::Args;

use shelf_core::AuthToken;

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Book id
    pub id: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &Context, args: GetArgs) -> Result<()> {
    let token = ctx.auth.token().unwrap_or_else(|| AuthToken::new(""));

    let book = ctx
        .remote
        .get_book(args.id, &token)
        .await
        .with_context(|| format!("Failed to get book {}", args.id))?;

    if args.json {
        output::json_pretty(&book)
    } else {
        output::book_detail(&book);
        Ok(())
    }
}
