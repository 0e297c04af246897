//! Shared utilities

use std::io::{self, BufRead, Write};

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// Print `prompt` and read one line from stdin on a blocking thread.
///
/// Returns `None` at end of input or on a read error.
pub async fn ask_line(prompt: String) -> Option<String> {
    tokio::task::spawn_blocking(move || {
        let mut stdout = io::stdout();
        let _ = write!(stdout, "{}", prompt);
        let _ = stdout.flush();
        read_line(&mut io::stdin().lock())
    })
    .await
    .ok()
    .flatten()
}

/// One line without its terminator; `None` at EOF
pub fn read_line(reader: &mut impl BufRead) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello world", 5), "hello...");
        assert_eq!(truncate_chars("héllo", 2), "hé...");
    }

    #[test]
    fn test_read_line() {
        let mut input = io::Cursor::new("yes\r\nsecond\n");
        assert_eq!(read_line(&mut input).as_deref(), Some("yes"));
        assert_eq!(read_line(&mut input).as_deref(), Some("second"));
        assert_eq!(read_line(&mut input), None);
    }
}
