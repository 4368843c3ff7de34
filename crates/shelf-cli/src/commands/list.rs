//! List command implementation.

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;

use shelf_core::{AuthToken, BookQuery};

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Page number, starting at 1
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Books per page
    #[arg(long)]
    pub limit: Option<u32>,

    /// Only books whose title contains this text
    #[arg(long, default_value = "")]
    pub title: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(ctx: &Context, args: ListArgs) -> Result<()> {
    let query = BookQuery {
        page: args.page,
        limit: args.limit.unwrap_or(ctx.config.page_limit),
        title: args.title,
    };
    let token = ctx.auth.token().unwrap_or_else(|| AuthToken::new(""));

    let books = ctx
        .remote
        .list_books(&query, &token)
        .await
        .context("Failed to list books")?;

    if args.json {
        return output::json(&books);
    }

    if books.is_empty() {
        println!("{}", "No books found.".dimmed());
        return Ok(());
    }

    for book in &books {
        output::book_line(book);
    }

    if books.len() as u32 == query.limit {
        println!();
        println!(
            "{}",
            format!("More books may follow. Use --page {}", query.page + 1).dimmed()
        );
    }

    Ok(())
}
