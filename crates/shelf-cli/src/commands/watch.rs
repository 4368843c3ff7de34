//! Watch command implementation.
//!
//! Runs the whole sync core in the foreground. Connectivity is driven by
//! lines on stdin, so the offline path can be exercised by hand:
//!
//! ```text
//! offline        mark the network down (closes the push channel)
//! online         mark it up again (reopens the channel and flushes the queue)
//! more           load the next page of the list
//! search TEXT    restart the list with a title filter
//! show ID        follow one book
//! list           print the list as currently merged
//! logout         end the session and drop the views
//! quit           stop
//! ```

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tokio::sync::mpsc;

use shelf_core::PushEvent;
use shelf_http::WsConnector;
use shelf_sync::{
    BookDetailView, BookListView, CloseReason, ConnectionState, ManualConnectivity,
    NetworkMonitor, PushChannel, SyncCoordinator,
};

use crate::context::Context;
use crate::output;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Initial title filter for the list
    #[arg(long, default_value = "")]
    pub title: String,

    /// Start with the network marked down
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Control {
    Online,
    Offline,
    More,
    Search(String),
    Show(i64),
    List,
    Logout,
    Quit,
}

fn parse_control(line: &str) -> Option<Control> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match (word, rest) {
        ("online", "") => Some(Control::Online),
        ("offline", "") => Some(Control::Offline),
        ("more", "") => Some(Control::More),
        ("search", text) => Some(Control::Search(text.to_string())),
        ("show", id) => id.parse().ok().map(Control::Show),
        ("list", "") => Some(Control::List),
        ("logout", "") => Some(Control::Logout),
        ("quit" | "exit", "") => Some(Control::Quit),
        _ => None,
    }
}

type Channel = PushChannel<WsConnector>;

pub async fn run(ctx: Context, args: WatchArgs) -> Result<()> {
    restore_session(&ctx).await;

    let connectivity = ManualConnectivity::new(!args.offline);
    let monitor = NetworkMonitor::start(Arc::new(connectivity.clone())).await;
    let channel = Arc::new(PushChannel::new(
        WsConnector::new(),
        ctx.config.server.clone(),
        ctx.config.event_buffer,
    ));
    let mut channel_state = channel.watch_state();

    let handle = SyncCoordinator::new(
        monitor,
        ctx.auth.clone(),
        ctx.engine.clone(),
        channel.clone(),
    )
    .with_retry_interval(ctx.config.retry_interval)
    .start();
    let mut network = handle.network();
    let mut reports = handle.flush_reports();

    eprintln!("{}", "Watching. Type 'online', 'offline' or 'quit'; Ctrl+C to stop.".dimmed());
    eprintln!();

    let mut list = Some(open_list(&ctx, &channel, &args.title).await);
    let mut detail: Option<BookDetailView> = None;
    let mut controls = spawn_stdin_reader();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            line = controls.recv(), if stdin_open => {
                let Some(line) = line else {
                    stdin_open = false;
                    continue;
                };
                match parse_control(&line) {
                    Some(Control::Quit) => break,
                    Some(control) => {
                        handle_control(
                            control,
                            &ctx,
                            &channel,
                            &connectivity,
                            &mut list,
                            &mut detail,
                        )
                        .await;
                    }
                    None if line.trim().is_empty() => {}
                    None => output::error(&format!("Unknown command: {}", line.trim())),
                }
            }

            changed = network.changed() => {
                if changed.is_err() {
                    break;
                }
                if *network.borrow_and_update() {
                    println!("{}", "Online".green());
                } else {
                    println!("{}", "Offline".red());
                }
            }

            changed = channel_state.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *channel_state.borrow_and_update();
                println!("{}", describe(state).dimmed());
            }

            changed = reports.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(report) = *reports.borrow_and_update() {
                    output::flush_report(&report);
                }
            }

            Some(event) = next_list_event(&mut list) => output::push_event(&event),

            Some(event) = next_detail_event(&mut detail) => {
                let followed = detail.as_ref().and_then(|view| view.book());
                if let (PushEvent::Updated(updated), Some(book)) = (&event, followed)
                    && updated.id == book.id
                {
                    output::book_detail(book);
                }
            }
        }
    }

    eprintln!("{}", "Stopping...".dimmed());
    handle.shutdown().await;
    Ok(())
}

async fn restore_session(ctx: &Context) {
    if ctx.auth.token().is_none() {
        output::warn("Not logged in; pushed updates are off until 'shelf login'");
        return;
    }

    match ctx.auth.check_token().await {
        Ok(true) => output::success("Session restored"),
        Ok(false) => output::warn("Stored token was rejected; pushed updates are off"),
        Err(e) => output::warn(&format!("Could not check the stored token: {e}")),
    }
}

async fn open_list(ctx: &Context, channel: &Channel, title: &str) -> BookListView {
    let mut view = BookListView::new(
        ctx.remote.clone(),
        ctx.auth.clone(),
        channel.subscribe(),
        ctx.config.page_limit,
    );
    view.reset(title);

    match view.load_next_page().await {
        Ok(_) => print_list(&view),
        Err(e) => output::error(&format!("Failed to load books: {e}")),
    }
    view
}

async fn handle_control(
    control: Control,
    ctx: &Context,
    channel: &Channel,
    connectivity: &ManualConnectivity,
    list: &mut Option<BookListView>,
    detail: &mut Option<BookDetailView>,
) {
    match control {
        Control::Online => connectivity.set(true),
        Control::Offline => connectivity.set(false),
        Control::More => match list.as_mut() {
            Some(view) if view.has_more() => {
                let before = view.books().len();
                match view.load_next_page().await {
                    Ok(_) => view.books()[before..].iter().for_each(output::book_line),
                    Err(e) => output::error(&format!("Failed to load books: {e}")),
                }
            }
            Some(_) => println!("{}", "No more books.".dimmed()),
            None => output::warn("No list open"),
        },
        Control::Search(text) => match list.as_mut() {
            Some(view) => match view.search(text).await {
                Ok(_) => print_list(view),
                Err(e) => output::error(&format!("Search failed: {e}")),
            },
            None => *list = Some(open_list(ctx, channel, &text).await),
        },
        Control::Show(id) => {
            let opened =
                BookDetailView::open(ctx.remote.clone(), &ctx.auth, channel.subscribe(), id).await;
            match opened {
                Ok(view) => {
                    if let Some(book) = view.book() {
                        output::book_detail(book);
                    }
                    *detail = Some(view);
                }
                Err(e) => output::error(&format!("Failed to get book {id}: {e}")),
            }
        }
        Control::List => match list {
            Some(view) => print_list(view),
            None => output::warn("No list open"),
        },
        Control::Logout => {
            // Views hold data fetched with the old session
            *list = None;
            *detail = None;
            match ctx.auth.logout().await {
                Ok(()) => output::success("Logged out"),
                Err(e) => output::error(&format!("Failed to logout: {e}")),
            }
        }
        Control::Quit => {}
    }
}

fn print_list(view: &BookListView) {
    if view.books().is_empty() {
        println!("{}", "No books found.".dimmed());
    }
    view.books().iter().for_each(output::book_line);
}

async fn next_list_event(list: &mut Option<BookListView>) -> Option<PushEvent> {
    match list {
        Some(view) => view.next_event().await,
        None => std::future::pending().await,
    }
}

async fn next_detail_event(detail: &mut Option<BookDetailView>) -> Option<PushEvent> {
    match detail {
        Some(view) => view.next_event().await,
        None => std::future::pending().await,
    }
}

fn describe(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Open => "Push channel open",
        ConnectionState::Opening => "Push channel connecting",
        ConnectionState::Closed(reason) => match reason {
            CloseReason::Idle => "Push channel idle",
            CloseReason::Offline => "Push channel closed (offline)",
            CloseReason::Unauthenticated => "Push channel closed (not logged in)",
            CloseReason::TransportFailed => "Push channel lost; it reopens on the next online transition",
            CloseReason::ServerClosed => "Push channel closed by the server",
            CloseReason::Shutdown => "Push channel shut down",
        },
    }
}

/// Forward stdin lines from a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        use std::io::BufRead;
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_controls() {
        assert_eq!(parse_control("online"), Some(Control::Online));
        assert_eq!(parse_control("  offline \n"), Some(Control::Offline));
        assert_eq!(
            parse_control("search The Hobbit"),
            Some(Control::Search("The Hobbit".to_string()))
        );
        assert_eq!(parse_control("search"), Some(Control::Search(String::new())));
        assert_eq!(parse_control("show 12"), Some(Control::Show(12)));
        assert_eq!(parse_control("exit"), Some(Control::Quit));
    }

    #[test]
    fn rejects_unknown_controls() {
        assert_eq!(parse_control("show twelve"), None);
        assert_eq!(parse_control("online now"), None);
        assert_eq!(parse_control("reconnect"), None);
    }
}
