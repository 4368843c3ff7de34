//! shelf - command line client for a book server.
//!
//! Writes that cannot reach the server are queued under the data directory
//! and replayed by `shelf flush` or while `shelf watch` is running.

mod cli;
mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use context::Context;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        Commands::Login(args) => commands::login::run(&ctx, args).await,
        Commands::Logout(args) => commands::logout::run(&ctx, args).await,
        Commands::Whoami(args) => commands::whoami::run(&ctx, args).await,
        Commands::List(args) => commands::list::run(&ctx, args).await,
        Commands::Get(args) => commands::get::run(&ctx, args).await,
        Commands::Add(args) => commands::write::add(&ctx, args).await,
        Commands::Edit(args) => commands::write::edit(&ctx, args).await,
        Commands::Queue(args) => commands::queue::run(&ctx, args),
        Commands::Flush(args) => commands::flush::run(&ctx, args).await,
        Commands::Watch(args) => commands::watch::run(ctx, args).await,
    }
}

fn init_logging(verbosity: u8, json: bool) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so command output stays parseable
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
