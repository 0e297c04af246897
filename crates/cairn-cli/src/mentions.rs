//! `@path` mentions in task text
//!
//! A mention of a readable file under the working directory is expanded by
//! prepending the file's content to the task.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// `@` at the start of the text or after whitespace or opening punctuation
static MENTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s(\[,;])@([\w./\\-]+)").ok());

/// Paths mentioned in `text`, in order of first appearance
pub fn extract_mentions(text: &str) -> Vec<String> {
    let Some(regex) = MENTION.as_ref() else {
        return Vec::new();
    };

    let mut mentions: Vec<String> = Vec::new();
    for caps in regex.captures_iter(text) {
        let path = caps[1].trim_end_matches(['.', ',']).to_string();
        if !path.is_empty() && !mentions.contains(&path) {
            mentions.push(path);
        }
    }
    mentions
}

/// Prepend the content of every mentioned file to `text`.
///
/// Mentions that are not readable files inside `cwd` are left as they are.
pub fn expand_mentions(text: &str, cwd: &Path) -> String {
    let Ok(root) = cwd.canonicalize() else {
        return text.to_string();
    };

    let mut blocks = Vec::new();
    for mention in extract_mentions(text) {
        let Ok(path) = cwd.join(&mention).canonicalize() else {
            continue;
        };
        if !path.starts_with(&root) || !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                blocks.push(format!("Content of @{}:\n```\n{}\n```", mention, content.trim_end()))
            }
            Err(e) => tracing::debug!("Skipping @{}: {}", mention, e),
        }
    }

    if blocks.is_empty() {
        text.to_string()
    } else {
        format!("{}\n\n{}", blocks.join("\n\n"), text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_mentions() {
        assert_eq!(
            extract_mentions("fix @src/main.rs and @README.md, then @src/main.rs."),
            vec!["src/main.rs", "README.md"]
        );
        assert!(extract_mentions("mail me at me@example.com").is_empty());
        assert_eq!(extract_mentions("(@a.txt)"), vec!["a.txt"]);
    }

    #[test]
    fn test_expand_readable_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "remember this\n").unwrap();

        let expanded = expand_mentions("summarize @notes.txt and @missing.txt", dir.path());
        assert_eq!(
            expanded,
            "Content of @notes.txt:\n```\nremember this\n```\n\nsummarize @notes.txt and @missing.txt"
        );
    }

    #[test]
    fn test_outside_cwd_is_ignored() {
        let outer = tempfile::tempdir().unwrap();
        let inner = outer.path().join("project");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(outer.path().join("secret.txt"), "nope").unwrap();

        let text = "read @../secret.txt";
        assert_eq!(expand_mentions(text, &inner), text);
    }
}
