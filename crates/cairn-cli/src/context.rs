//! Project rule loading
//!
//! Rules are standing instructions kept in the working directory: an
//! `AGENTS.md` file and a `.clinerules` file or directory of Markdown files
//! (the place `new_rule` writes to). Their contents are appended to the
//! system prompt.

use std::fs;
use std::path::{Path, PathBuf};

const RULE_FILE_NAMES: &[&str] = &["AGENTS.md"];
const RULES_ENTRY: &str = ".clinerules";

/// Combined rule text for `cwd`, if there is any
pub fn load_rules(cwd: &Path) -> Option<String> {
    let parts: Vec<String> = rule_files(cwd)
        .iter()
        .filter_map(|path| {
            let content = fs::read_to_string(path).ok()?;
            let content = content.trim();
            if content.is_empty() {
                return None;
            }
            let name = path.strip_prefix(cwd).unwrap_or(path).display();
            Some(format!("## {}\n\n{}", name, content))
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Rule files that would be loaded, in order
pub fn rule_files(cwd: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = RULE_FILE_NAMES
        .iter()
        .map(|name| cwd.join(name))
        .filter(|path| path.is_file())
        .collect();

    let rules = cwd.join(RULES_ENTRY);
    if rules.is_file() {
        files.push(rules);
    } else if let Ok(entries) = fs::read_dir(&rules) {
        let mut found: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "md" || e == "txt"))
            .collect();
        found.sort();
        files.extend(found);
    }

    files
}
