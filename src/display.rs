//! Colored terminal display for supervised runs.
//!
//! This module renders log records, credential prompts and run summaries
//! for the command-line consumer.

use std::io::{self, Write};
use std::time::Instant;

use chrono::Local;
use owo_colors::OwoColorize;

use crate::protocol::{Event, InputKind, LogFilter, LogLevel, LogRecord};
use crate::session::{format_elapsed, format_rate, format_size, ProgressSnapshot, RunOutcome};

/// Width of separator lines.
const SEPARATOR_WIDTH: usize = 50;

/// Wall-clock time in the log panel format.
fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Icon shown before a record of the given level.
#[must_use]
pub fn level_icon(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "ℹ",
        LogLevel::Success => "✓",
        LogLevel::Warning => "⚠",
        LogLevel::Error => "✗",
    }
}

/// Title and label used when asking the user for a credential.
#[must_use]
pub fn prompt_text(kind: &InputKind) -> (&'static str, &'static str) {
    match kind {
        InputKind::Phone => (
            "Login - Phone Number",
            "Enter your phone number (with country code), e.g. +919876543210:",
        ),
        InputKind::Code => (
            "Verification Code",
            "Enter the code you received:",
        ),
        InputKind::Password => ("2FA Password", "Enter your 2FA password (if enabled):"),
        InputKind::Unknown(_) => ("Input", "Enter a value:"),
    }
}

/// Print a log record.
pub fn print_record(record: &LogRecord) {
    let icon = level_icon(record.level);
    let ts = format!("[{}]", timestamp());
    match record.level {
        LogLevel::Info => println!("{} {icon} {}", ts.dimmed(), record.text),
        LogLevel::Success => println!("{} {}", ts.dimmed(), format!("{icon} {}", record.text).green()),
        LogLevel::Warning => {
            println!("{} {}", ts.dimmed(), format!("{icon} {}", record.text).yellow());
        }
        LogLevel::Error => println!("{} {}", ts.dimmed(), format!("{icon} {}", record.text).red()),
    }
    let _ = io::stdout().flush();
}

/// Print an event if it has a log presentation that passes the filter.
pub fn print_event(event: &Event, filter: &LogFilter) {
    let Some(record) = event.log_record() else {
        return;
    };
    if let Some(text) = filter.apply(&record.text) {
        print_record(&LogRecord::new(text, record.level));
    }
}

/// Print a separator line.
pub fn print_separator() {
    println!("{}", "=".repeat(SEPARATOR_WIDTH).dimmed());
    let _ = io::stdout().flush();
}

/// Print the title and label of a credential prompt to stderr.
pub fn print_prompt_header(kind: &InputKind) {
    let (title, label) = prompt_text(kind);
    eprintln!("{} {}", format!("[{title}]").cyan().bold(), label);
}

/// Print a credential prompt to stderr, leaving the cursor on the line.
pub fn print_prompt(kind: &InputKind) {
    print_prompt_header(kind);
    eprint!("> ");
    let _ = io::stderr().flush();
}

/// Render a one-line progress summary.
#[must_use]
pub fn format_progress(snapshot: &ProgressSnapshot, now: Instant) -> String {
    format!(
        "Files: {} | Downloaded: {} | Speed: {} | Time: {}",
        snapshot.files_count,
        format_size(snapshot.bytes_total),
        format_rate(snapshot.rate_at(now)),
        format_elapsed(snapshot.elapsed_at(now))
    )
}

/// Print the progress summary line.
pub fn print_progress(snapshot: &ProgressSnapshot) {
    println!(
        "{} {}",
        "[PROGRESS]".blue().bold(),
        format_progress(snapshot, Instant::now())
    );
    let _ = io::stdout().flush();
}

/// Print the final outcome of a run.
pub fn print_outcome(outcome: &RunOutcome) {
    print_separator();
    if outcome.is_success() {
        println!(
            "{} {} run completed in {}",
            "[DONE]".green().bold(),
            outcome.kind,
            format_elapsed(outcome.duration)
        );
    } else {
        println!(
            "{} {} run ended: {}",
            "[DONE]".red().bold(),
            outcome.kind,
            outcome.state
        );
    }
    print_separator();
}
