//! Per-session mutable state owned by one agent

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::memory::{Memory, MemoryConfig};

/// Whether the agent is planning or acting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Act,
    Plan,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Act => f.write_str("act"),
            Mode::Plan => f.write_str("plan"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "act" => Ok(Mode::Act),
            "plan" => Ok(Mode::Plan),
            other => Err(format!("unknown mode '{}' (expected 'act' or 'plan')", other)),
        }
    }
}

/// Consecutive tool failures and repeated patch failures per file
#[derive(Debug, Clone, Default)]
pub struct ErrorTracker {
    consecutive: u32,
    diff_failures: HashMap<PathBuf, u32>,
}

impl ErrorTracker {
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn record_error(&mut self) {
        self.consecutive += 1;
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn diff_failures(&self, path: &Path) -> u32 {
        self.diff_failures.get(path).copied().unwrap_or(0)
    }

    /// Count one more failed patch on `path`, returning the new count
    pub fn record_diff_failure(&mut self, path: &Path) -> u32 {
        let count = self.diff_failures.entry(path.to_path_buf()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn reset_diff_failures(&mut self, path: &Path) {
        self.diff_failures.remove(path);
    }
}

/// Everything that changes turn by turn in one session
#[derive(Debug, Clone)]
pub struct Session {
    pub memory: Memory,
    pub errors: ErrorTracker,
    pub mode: Mode,
    /// Dollars spent on LLM calls so far
    pub cost: f64,
}

impl Session {
    pub fn new(system_prompt: impl Into<String>, memory: MemoryConfig) -> Self {
        Self {
            memory: Memory::new(system_prompt, memory),
            errors: ErrorTracker::default(),
            mode: Mode::default(),
            cost: 0.0,
        }
    }

    pub fn consecutive_tool_errors(&self) -> u32 {
        self.errors.consecutive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!("PLAN".parse::<Mode>(), Ok(Mode::Plan));
        assert_eq!(" act ".parse::<Mode>(), Ok(Mode::Act));
        assert!("review".parse::<Mode>().is_err());
        assert_eq!(Mode::default(), Mode::Act);
    }

    #[test]
    fn test_error_tracker() {
        let mut errors = ErrorTracker::default();
        errors.record_error();
        errors.record_error();
        assert_eq!(errors.consecutive(), 2);
        errors.reset();
        assert_eq!(errors.consecutive(), 0);

        let path = Path::new("/tmp/a.rs");
        assert_eq!(errors.record_diff_failure(path), 1);
        assert_eq!(errors.record_diff_failure(path), 2);
        assert_eq!(errors.diff_failures(Path::new("/tmp/b.rs")), 0);
        errors.reset_diff_failures(path);
        assert_eq!(errors.diff_failures(path), 0);
    }
}
