//! Output formatting helpers.

use anyhow::Result;
use chrono::Local;
use colored::Colorize;
use serde::Serialize;

use shelf_core::{Book, MutationEntry, PushEvent};
use shelf_sync::FlushReport;

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning that is not a failure.
pub fn warn(msg: &str) {
    println!("{} {}", "!".yellow(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print a value as compact JSON.
pub fn json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    println!("{}", json);
    Ok(())
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

/// One line per book: id, title and author.
pub fn book_line(book: &Book) {
    let author = if book.author.is_empty() {
        String::new()
    } else {
        format!(" by {}", book.author)
    };
    println!("{:>5}  {}{}", book.id.to_string().dimmed(), book.title, author);
}

/// All fields of one book.
pub fn book_detail(book: &Book) {
    field("ID", &book.id.to_string());
    field("Title", &book.title);
    field("Author", &book.author);
    field("Released", &book.release_date);
    field("Quantity", &book.quantity.to_string());
    field("Rentable", if book.is_rentable { "yes" } else { "no" });
    if let Some((lat, long)) = book.location() {
        field("Location", &format!("{lat}, {long}"));
    }
    if !book.image.is_empty() {
        field("Image", &format!("{} bytes (base64)", book.image.len()));
    }
}

pub fn queue_entry(position: usize, entry: &MutationEntry) {
    let queued = entry
        .queued_at
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!(
        "{:>3}. {:<4} #{} {} {}",
        position,
        entry.kind.to_string().cyan(),
        entry.record.id,
        entry.record.title,
        format!("(queued {})", queued).dimmed()
    );
}

pub fn flush_report(report: &FlushReport) {
    println!(
        "{} attempted, {} synced, {} failed, {} pending",
        report.attempted,
        report.succeeded.to_string().green(),
        report.failed.to_string().red(),
        report.remaining
    );
}

/// Print a pushed change the way the live view applied it.
pub fn push_event(event: &PushEvent) {
    match event {
        PushEvent::Created(book) => {
            println!("{} #{} {}", "CREATE".cyan(), book.id, book.title);
        }
        PushEvent::Updated(book) => {
            println!("{} #{} {}", "UPDATE".yellow(), book.id, book.title);
        }
        PushEvent::Unknown { kind } => {
            println!("{} {}", "IGNORED".dimmed(), kind);
        }
    }
}
