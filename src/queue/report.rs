//! Flush results and their human-readable rendering.

use colored::Colorize;
use serde::Serialize;

use super::events::{DropReason, SyncTrigger};
use super::request::HttpMethod;

/// How a flush invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushOutcome {
    /// Every pending entry was attempted.
    Completed,
    /// The queue was reset mid-flush; remaining entries were not attempted.
    Interrupted,
    /// The client is offline; nothing was touched.
    SkippedOffline,
    /// Another flush is running; nothing was touched.
    SkippedInProgress,
}

/// What happened to one entry during a flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EntryStatus {
    Sent { status: u16 },
    Retrying { retry_count: u32, max_retries: u32 },
    Dropped { reason: DropReason },
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryResult {
    pub id: i64,
    pub method: HttpMethod,
    pub url: String,
    #[serde(flatten)]
    pub status: EntryStatus,
    /// Error of the failed attempt.
    pub error: Option<String>,
}

/// Result of one flush invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub trigger: SyncTrigger,
    pub outcome: FlushOutcome,
    pub sent: usize,
    pub retrying: usize,
    pub dropped: usize,
    pub results: Vec<EntryResult>,
}

impl FlushReport {
    /// Create an empty report.
    #[must_use]
    pub const fn new(trigger: SyncTrigger, outcome: FlushOutcome) -> Self {
        Self {
            trigger,
            outcome,
            sent: 0,
            retrying: 0,
            dropped: 0,
            results: Vec::new(),
        }
    }

    /// Add a result.
    pub fn add(&mut self, result: EntryResult) {
        match result.status {
            EntryStatus::Sent { .. } => self.sent += 1,
            EntryStatus::Retrying { .. } => self.retrying += 1,
            EntryStatus::Dropped { .. } => self.dropped += 1,
        }
        self.results.push(result);
    }

    /// Whether the flush was skipped without touching the queue.
    #[must_use]
    pub const fn was_skipped(&self) -> bool {
        matches!(
            self.outcome,
            FlushOutcome::SkippedOffline | FlushOutcome::SkippedInProgress
        )
    }

    /// Get total entries attempted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.sent + self.retrying + self.dropped
    }
}

/// Format a flush report for display.
#[must_use]
pub fn format_flush_report(report: &FlushReport) -> String {
    match report.outcome {
        FlushOutcome::SkippedOffline => {
            return format!("{} backend unreachable, queue left untouched", "○".yellow());
        }
        FlushOutcome::SkippedInProgress => {
            return format!("{} another flush is already running", "○".yellow());
        }
        FlushOutcome::Completed | FlushOutcome::Interrupted => {}
    }

    if report.total() == 0 {
        return "No pending requests to send.".to_string();
    }

    let mut lines = Vec::new();

    lines.push(format!("Flush completed: {} requests", report.total()));
    lines.push("─".repeat(40));

    if report.sent > 0 {
        lines.push(format!(
            "  {} {}",
            "✓".green(),
            format!("{} sent", report.sent).green()
        ));
    }

    if report.retrying > 0 {
        lines.push(format!(
            "  {} {}",
            "↻".yellow(),
            format!("{} will be retried", report.retrying).yellow()
        ));
    }

    if report.dropped > 0 {
        lines.push(format!(
            "  {} {}",
            "✗".red(),
            format!("{} dropped", report.dropped).red()
        ));
    }

    if report.outcome == FlushOutcome::Interrupted {
        lines.push(format!("  {}", "queue was reset during the flush".dimmed()));
    }

    let errors: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.error.is_some())
        .take(3)
        .collect();

    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        for err in errors {
            lines.push(format!(
                "  - #{} {} {}: {}",
                err.id,
                err.method,
                err.url,
                err.error.as_deref().unwrap_or("Unknown error")
            ));
        }
    }

    lines.join("\n")
}
