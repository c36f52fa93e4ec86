//! Terminal output, confirmation, and progress reporting

use colored::Colorize;
use declarative::{
    ApplyResult, ApplySummary, ConfirmCallback, EntryKind, Error, ProgressCallback,
    ScriptOnceState,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::Path;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Short description of an apply outcome
pub fn result_label(result: &ApplyResult) -> String {
    match result {
        ApplyResult::NoChange => "up to date".dimmed().to_string(),
        ApplyResult::Created => "created".green().to_string(),
        ApplyResult::Modified => "updated".yellow().to_string(),
        ApplyResult::PermissionsChanged => "permissions".yellow().to_string(),
        ApplyResult::Removed => "removed".red().to_string(),
        ApplyResult::Ran => "ran".cyan().to_string(),
        ApplyResult::Skipped { reason } => format!("skipped ({reason})").dimmed().to_string(),
    }
}

/// Summary line for a finished batch
pub fn summary_line(summary: &ApplySummary) -> String {
    let mut parts = Vec::new();
    for (count, label) in [
        (summary.created, "created"),
        (summary.modified, "modified"),
        (summary.removed, "removed"),
        (summary.scripts_run, "scripts run"),
        (summary.skipped, "skipped"),
        (summary.failed, "failed"),
    ] {
        if count > 0 {
            parts.push(format!("{count} {label}"));
        }
    }
    if parts.is_empty() {
        "no changes".to_string()
    } else {
        parts.join(", ")
    }
}

/// Print a finished batch summary
pub fn print_summary(summary: &ApplySummary) {
    let line = summary_line(summary);
    if summary.is_success() {
        success(&line);
    } else {
        error(&line);
    }
}

/// Print once-script ledger records, oldest first
pub fn print_once_records(records: &[(String, ScriptOnceState)]) {
    if records.is_empty() {
        info("No scripts have been recorded");
        return;
    }
    header("Scripts run once");
    let mut sorted: Vec<_> = records.iter().collect();
    sorted.sort_by_key(|(_, record)| record.executed_at);
    for (key, record) in sorted {
        let sum = key.rsplit(':').next().unwrap_or_default();
        println!(
            "  {} {} {}",
            record.executed_at.format("%Y-%m-%d %H:%M:%S"),
            record.name.bold(),
            sum.get(..12).unwrap_or(sum).dimmed()
        );
    }
}

/// Asks on the terminal before changes are made.
///
/// Without an interactive stdin the answer is `assume_yes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirm {
    assume_yes: bool,
}

impl TerminalConfirm {
    pub const fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ConfirmCallback for TerminalConfirm {
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool> {
        if self.assume_yes {
            return Ok(true);
        }
        if !std::io::stdin().is_terminal() {
            log::warn!("stdin is not a terminal, declining: {prompt}");
            return Ok(false);
        }

        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;

        Ok(confirmed)
    }
}

/// Progress bar over a batch, printing each change above the bar
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::new(0),
        }
    }

    /// A bar that never draws
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for BarProgress {
    fn on_batch_start(&mut self, count: usize) {
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|s| s.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        self.bar.set_style(style);
        self.bar.set_length(count as u64);
        self.bar.set_position(0);
    }

    fn on_entry_start(&mut self, path: &Path, _kind: EntryKind) {
        self.bar.set_message(path.display().to_string());
    }

    fn on_entry_complete(&mut self, path: &Path, result: &ApplyResult) {
        if result.is_change() {
            self.bar
                .println(format!("  {} {}", result_label(result), path.display()));
        }
        self.bar.inc(1);
    }

    fn on_entry_failed(&mut self, path: &Path, error: &Error) {
        self.bar
            .println(format!("  {} {}: {error}", "✗".red(), path.display()));
        self.bar.inc(1);
    }

    fn on_batch_complete(&mut self) {
        self.bar.finish_and_clear();
    }
}
