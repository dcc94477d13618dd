// src/utils/console.rs

//! Console report formatting for the command-line front end.
//!
//! Diagnostic logging goes through the `log` facade; this module only prints
//! the human-facing reports (validation results, run summaries).

use chrono::Local;

/// Format a report line with timestamp
fn format_line(message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{}] {}", timestamp, message)
}

/// Print a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    println!("{}", format_line(&border));
    println!("{}", format_line(&format!("  {}", title)));
    println!("{}", format_line(&border));
}

/// Print a success line
pub fn success(message: &str) {
    println!("{}", format_line(&format!("[OK] {}", message)));
}

/// Print a failure line
pub fn failure(message: &str) {
    eprintln!("{}", format_line(&format!("[FAILED] {}", message)));
}

/// Print a sub-item (indented)
pub fn sub_item(message: &str) {
    println!("{}", format_line(&format!("    {}", message)));
}

/// Print a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("{}", format_line(&format!("[SUMMARY] {}", title)));
    for line in summary_lines(items) {
        println!("{}", format_line(&line));
    }
}

fn summary_lines(items: &[(&str, String)]) -> Vec<String> {
    items
        .iter()
        .map(|(key, value)| format!("    {}: {}", key, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_has_timestamp() {
        let line = format_line("hello");
        assert!(line.starts_with('['));
        assert!(line.ends_with("] hello"));
    }

    #[test]
    fn test_summary_lines() {
        let lines = summary_lines(&[("Saved", "5".to_string()), ("Failed URLs", "0".to_string())]);
        assert_eq!(lines, vec!["    Saved: 5", "    Failed URLs: 0"]);
    }
}
