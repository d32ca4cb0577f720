use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::queue::QueuedRequest;

/// Human form of how long ago `at` was.
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(at);
    if age.num_days() > 0 {
        format!("{} days ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{} hours ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{} minutes ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

/// Format pending requests as a pretty table
pub fn format_requests_pretty(requests: &[QueuedRequest], depth: u64) -> String {
    if depth == 0 {
        return "Request Queue (0 pending)\n  No pending requests".to_string();
    }

    let now = Utc::now();
    let mut output = format!("Request Queue ({depth} pending)\n");
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for request in requests {
        let attempts = format!("{}/{}", request.retry_count, request.max_retries);
        let attempts = if request.retry_count == 0 {
            attempts.dimmed()
        } else {
            attempts.yellow()
        };

        let mut line = format!(
            "{:>5} {:<6} {}  {}  {}",
            format!("#{}", request.id).dimmed(),
            request.method.as_str().bold(),
            request.url,
            attempts,
            format_age(request.enqueued_at, now).dimmed()
        );

        if let Some(error) = &request.last_error {
            line.push_str(&format!("\n        {}", error.red()));
        }

        output.push_str(&line);
        output.push('\n');
    }

    let shown = requests.len() as u64;
    if shown < depth {
        output.push_str(&format!("  {}\n", format!("... and {} more", depth - shown).dimmed()));
    }

    output
}

/// Format queue status as pretty output
pub fn format_status_pretty(depth: u64, oldest: Option<DateTime<Utc>>, online: bool) -> String {
    let mut lines = Vec::new();

    lines.push("Request Queue Status".bold().to_string());
    lines.push("─".repeat(40));

    lines.push(format!(
        "  Pending:    {} {}",
        depth,
        if depth > 0 {
            "requests waiting".dimmed()
        } else {
            "".dimmed()
        }
    ));

    lines.push(format!(
        "  Backend:    {}",
        if online {
            "reachable".green()
        } else {
            "unreachable".red()
        }
    ));

    if let Some(oldest) = oldest {
        lines.push(format!(
            "  Oldest:     {}",
            format_age(oldest, Utc::now()).dimmed()
        ));
    }

    if depth > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'fitqueue flush' to send pending requests"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{Headers, HttpMethod};
    use chrono::Duration;

    fn make_request(id: i64, retry_count: u32) -> QueuedRequest {
        QueuedRequest {
            id,
            method: HttpMethod::Delete,
            url: format!("/api/logs/{id}"),
            payload: None,
            headers: Headers::new(),
            enqueued_at: Utc::now(),
            retry_count,
            max_retries: 3,
            last_attempt: None,
            last_error: (retry_count > 0).then(|| "HTTP 500".to_string()),
        }
    }

    #[test]
    fn test_format_age() {
        let now = Utc::now();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(format_age(now - Duration::minutes(5), now), "5 minutes ago");
        assert_eq!(format_age(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(format_age(now - Duration::days(2), now), "2 days ago");
    }

    #[test]
    fn test_format_requests_pretty() {
        colored::control::set_override(false);

        let output = format_requests_pretty(&[make_request(1, 0), make_request(2, 2)], 4);

        assert!(output.starts_with("Request Queue (4 pending)"));
        assert!(output.contains("DELETE"));
        assert!(output.contains("/api/logs/2"));
        assert!(output.contains("2/3"));
        assert!(output.contains("HTTP 500"));
        assert!(output.contains("... and 2 more"));
    }

    #[test]
    fn test_format_requests_empty() {
        let output = format_requests_pretty(&[], 0);
        assert!(output.contains("No pending requests"));
    }

    #[test]
    fn test_format_requests_zero_limit_keeps_depth() {
        colored::control::set_override(false);

        let output = format_requests_pretty(&[], 3);
        assert!(output.starts_with("Request Queue (3 pending)"));
        assert!(output.contains("... and 3 more"));
        assert!(!output.contains("No pending requests"));
    }

    #[test]
    fn test_format_status_pretty() {
        colored::control::set_override(false);

        let output = format_status_pretty(2, Some(Utc::now()), false);
        assert!(output.contains("Pending:    2"));
        assert!(output.contains("unreachable"));
        assert!(output.contains("fitqueue flush"));
    }
}
