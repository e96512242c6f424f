use colored::Colorize;
use reconcile::ReconcileSummary;
use similar::{ChangeTag, TextDiff};

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

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print an indented block of text
pub fn block(text: &str) {
    for line in text.lines() {
        println!("    {line}");
    }
}

// ============================================================================
// Diffs
// ============================================================================

/// Changed lines between `old` and `new`, without the unchanged ones
pub fn changed_lines(old: &str, new: &str) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(old, new)
        .iter_all_changes()
        .filter(|change| change.tag() != ChangeTag::Equal)
        .map(|change| (change.tag(), change.value().trim_end_matches('\n').to_string()))
        .collect()
}

/// Print a coloured line diff, or a note when both sides match
pub fn line_diff(old: &str, new: &str) {
    let changes = changed_lines(old, new);
    if changes.is_empty() {
        println!("    {}", "(no differences)".dimmed());
        return;
    }
    for (tag, line) in changes {
        match tag {
            ChangeTag::Delete => println!("    {}", format!("- {line}").red()),
            ChangeTag::Insert => println!("    {}", format!("+ {line}").green()),
            ChangeTag::Equal => {}
        }
    }
}

// ============================================================================
// Summary
// ============================================================================

pub fn summary_line(summary: &ReconcileSummary) -> String {
    format!(
        "{} created, {} modified, {} unchanged, {} failed",
        summary.created, summary.modified, summary.no_change, summary.failed
    )
}

pub fn summary(summary: &ReconcileSummary) {
    let line = summary_line(summary);
    if summary.is_success() {
        success(&line);
    } else {
        error(&line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed_lines() {
        let old = "{\n  \"name\": \"edge\",\n  \"timeout\": 60\n}\n";
        let new = "{\n  \"name\": \"edge-2\",\n  \"timeout\": 60\n}\n";

        let changes = changed_lines(old, new);

        assert_eq!(
            changes,
            vec![
                (ChangeTag::Delete, "  \"name\": \"edge\",".to_string()),
                (ChangeTag::Insert, "  \"name\": \"edge-2\",".to_string()),
            ]
        );
        assert!(changed_lines(old, old).is_empty());
    }

    #[test]
    fn test_summary_line() {
        let summary = ReconcileSummary {
            created: 1,
            modified: 2,
            no_change: 3,
            ..ReconcileSummary::default()
        };
        assert_eq!(summary_line(&summary), "1 created, 2 modified, 3 unchanged, 0 failed");
    }
}
