//! Conversation history with bounded growth and a side-table of file contents

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use cairn_ai::{Message, Role};
use serde::{Deserialize, Serialize};

const SUMMARY_HEADER: &str = "Summary of earlier conversation:";

/// Limits for conversation memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// History longer than this is summarized
    pub max_messages: usize,
    /// Longest line allowed in a summary
    pub summary_char_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: 50,
            summary_char_limit: 200,
        }
    }
}

/// Ordered message history whose first message is always the system prompt
#[derive(Debug, Clone)]
pub struct Memory {
    config: MemoryConfig,
    messages: Vec<Message>,
    file_context: BTreeMap<PathBuf, String>,
}

impl Memory {
    pub fn new(system_prompt: impl Into<String>, config: MemoryConfig) -> Self {
        Self {
            config,
            messages: vec![Message::system(system_prompt)],
            file_context: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Append a message, summarizing older history if it grew too long.
    ///
    /// Returns `true` when a summarization happened.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> bool {
        self.messages.push(Message::new(role, content));
        if self.messages.len() > self.config.max_messages {
            self.summarize()
        } else {
            false
        }
    }

    /// Collapse everything between the system prompt and the most recent
    /// `max_messages / 2` messages into one system message.
    pub fn summarize(&mut self) -> bool {
        let keep = self.config.max_messages / 2;
        let len = self.messages.len();
        if len <= keep + 1 {
            return false;
        }

        let split = len - keep;
        let mut summary = String::from(SUMMARY_HEADER);
        for msg in &self.messages[1..split] {
            summary.push('\n');
            summary.push_str(&shorten(
                &format!("{}: {}", msg.role, msg.content),
                self.config.summary_char_limit,
            ));
        }

        let recent = self.messages.split_off(split);
        self.messages.truncate(1);
        self.messages.push(Message::system(summary));
        self.messages.extend(recent);

        tracing::debug!(
            "Summarized {} messages; history is now {} messages",
            split - 1,
            self.messages.len()
        );
        true
    }

    pub fn record_file_context(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.file_context.insert(path.into(), content.into());
    }

    pub fn file_context(&self, path: &Path) -> Option<&str> {
        self.file_context.get(path).map(String::as_str)
    }

    /// Every remembered file, ordered by path
    pub fn file_contexts(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.file_context
            .iter()
            .map(|(p, c)| (p.as_path(), c.as_str()))
    }

    /// A copy of the history
    pub fn history(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages sharing the most words with `query`, best first.
    ///
    /// Messages with no word in common are left out; ties keep history order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Message> {
        let query_words = words(query);
        if query_words.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &Message)> = self
            .messages
            .iter()
            .filter_map(|msg| {
                let score = words(&msg.content).intersection(&query_words).count();
                (score > 0).then_some((score, msg))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(top_k)
            .map(|(_, msg)| msg.clone())
            .collect()
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// One line of at most `limit` characters, ending in "..." when cut
fn shorten(text: &str, limit: usize) -> String {
    let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if line.chars().count() <= limit {
        return line;
    }
    let mut cut: String = line.chars().take(limit.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(max_messages: usize) -> Memory {
        Memory::new(
            "system prompt",
            MemoryConfig {
                max_messages,
                summary_char_limit: 20,
            },
        )
    }

    #[test]
    fn test_starts_with_system_prompt() {
        let memory = Memory::new("sys", MemoryConfig::default());
        assert_eq!(memory.history(), vec![Message::system("sys")]);
    }

    #[test]
    fn test_no_summary_at_limit() {
        let mut memory = small(6);
        for i in 0..5 {
            assert!(!memory.append(Role::User, format!("m{}", i)));
        }
        assert_eq!(memory.len(), 6);
    }

    #[test]
    fn test_summarizes_past_limit() {
        let mut memory = small(6);
        for i in 0..5 {
            memory.append(Role::User, format!("m{}", i));
        }
        assert!(memory.append(Role::Assistant, "m5"));

        let history = memory.history();
        // system + summary + the 3 most recent
        assert_eq!(history.len(), 5);
        assert_eq!(history[0], Message::system("system prompt"));
        assert_eq!(history[1].role, Role::System);
        assert_eq!(
            history[1].content,
            format!("{}\nuser: m0\nuser: m1\nuser: m2", SUMMARY_HEADER)
        );
        assert_eq!(history[2].content, "m3");
        assert_eq!(history[4], Message::assistant("m5"));
    }

    #[test]
    fn test_summary_lines_are_limited() {
        let mut memory = small(2);
        memory.append(Role::User, "a very long message\nspanning several lines of text");
        memory.append(Role::Assistant, "ok");

        let summary = &memory.messages()[1].content;
        let line = summary.lines().nth(1).unwrap();
        assert_eq!(line, "user: a very long...");
        assert_eq!(line.chars().count(), 20);
    }

    #[test]
    fn test_shorten_counts_chars_not_bytes() {
        assert_eq!(shorten("ééééé", 5), "ééééé");
        assert_eq!(shorten("éééééé", 5), "éé...");
    }

    #[test]
    fn test_file_context() {
        let mut memory = small(10);
        memory.record_file_context("/p/a.txt", "one");
        memory.record_file_context("/p/a.txt", "two");
        assert_eq!(memory.file_context(Path::new("/p/a.txt")), Some("two"));
        assert_eq!(memory.file_contexts().count(), 1);
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_search() {
        let mut memory = small(50);
        memory.append(Role::User, "Please fix the parser bug");
        memory.append(Role::Assistant, "The parser is in src/parser.rs");
        memory.append(Role::User, "Unrelated question about dinner");
        memory.append(Role::Assistant, "Fixed the parser bug, parser tests pass.");

        let hits = memory.search("parser bug", 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "Please fix the parser bug");
        assert_eq!(hits[1].content, "Fixed the parser bug, parser tests pass.");

        assert!(memory.search("nothing matches", 5).is_empty());
        assert!(memory.search("parser", 0).is_empty());
    }
}
