//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::flush::FlushArgs;
use crate::commands::get::GetArgs;
use crate::commands::list::ListArgs;
use crate::commands::login::LoginArgs;
use crate::commands::logout::LogoutArgs;
use crate::commands::queue::QueueArgs;
use crate::commands::watch::WatchArgs;
use crate::commands::whoami::WhoamiArgs;
use crate::commands::write::WriteArgs;

/// Offline-resilient client for a book server.
#[derive(Parser, Debug)]
#[command(name = "shelf")]
#[command(author, version = env!("SHELF_VERSION"), about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Book server base URL
    #[arg(long, env = "SHELF_SERVER", global = true)]
    pub server: Option<String>,

    /// Directory holding the session and the pending-write queue
    #[arg(long, env = "SHELF_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Also retry queued writes every N seconds while online (watch only)
    #[arg(long, value_name = "SECS", global = true)]
    pub retry_interval: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session token
    Login(LoginArgs),

    /// Log out and forget the stored token
    Logout(LogoutArgs),

    /// Check whether the stored token is still accepted
    Whoami(WhoamiArgs),

    /// List one page of books
    List(ListArgs),

    /// Show one book
    Get(GetArgs),

    /// Create a book, queueing it if the server is unreachable
    Add(WriteArgs),

    /// Replace a book, queueing the edit if the server is unreachable
    Edit(WriteArgs),

    /// Show pending writes in replay order
    Queue(QueueArgs),

    /// Replay pending writes once
    Flush(FlushArgs),

    /// Keep the client running: sync on reconnect and print pushed changes
    Watch(WatchArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shelf",
            "list",
            "--server",
            "http://books.local:3000",
            "--data-dir",
            "/tmp/shelf",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://books.local:3000"));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/shelf")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn add_reads_record_from_json_flag() {
        let cli = Cli::try_parse_from(["shelf", "add", "--json", "-"]).unwrap();
        match cli.command {
            Commands::Add(args) => assert_eq!(args.file, PathBuf::from("-")),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
