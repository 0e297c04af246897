//! Regex content search tool

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;
use std::fs;
use std::path::{Path, PathBuf};

/// Most matches returned by one search
const MAX_MATCHES: usize = 300;
/// Maximum length of a matching line before truncation
const MAX_LINE_LENGTH: usize = 500;

const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// Tool for searching file contents with regex
pub struct GrepTool;

impl GrepTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GrepTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> ToolName {
        ToolName::SearchFiles
    }

    fn description(&self) -> &str {
        "Search files under a directory for a regular expression. Returns matching lines as file:line:content, with paths relative to the searched directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[
            ("path", "Directory to search recursively (relative to the working directory)", true),
            ("regex", "Regular expression to search for (Rust regex syntax)", true),
            ("file_pattern", "Glob matched against file names, e.g. '*.rs' (default: all files)", false),
        ])
    }

    async fn execute(&self, params: &ToolParams, ctx: &ToolContext) -> ToolResult {
        let path_str = params.get_non_empty("path").unwrap_or(".");
        let pattern_str = params
            .get("regex")
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ToolError::InvalidValue("missing 'regex'".into()))?;

        let regex = regex::Regex::new(pattern_str)
            .map_err(|e| ToolError::Failed(format!("Invalid regex pattern: {}", e)))?;
        let file_pattern = params
            .get_non_empty("file_pattern")
            .map(|p| {
                glob::Pattern::new(p.trim())
                    .map_err(|e| ToolError::Failed(format!("Invalid file_pattern: {}", e)))
            })
            .transpose()?;

        let root = ctx.resolve_path(path_str);
        if !root.is_dir() {
            return Err(ToolError::Failed(format!("Path is not a directory: {}", path_str)));
        }

        let mut files = Vec::new();
        collect_files(&root, file_pattern.as_ref(), &mut files);
        files.sort();

        let mut matches = Vec::new();
        for file in &files {
            search_file(&root, file, &regex, &mut matches);
            if matches.len() >= MAX_MATCHES {
                break;
            }
        }

        if matches.is_empty() {
            return Ok("No matches found".to_string());
        }

        let truncated = matches.len() > MAX_MATCHES;
        matches.truncate(MAX_MATCHES);
        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!("\n\n(showing first {} matches)", MAX_MATCHES));
        }
        Ok(output)
    }
}

fn collect_files(dir: &Path, pattern: Option<&glob::Pattern>, files: &mut Vec<PathBuf>) {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return;
    };

    for entry in read_dir.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        if path.is_dir() {
            if !SKIPPED_DIRS.iter().any(|d| name == *d) {
                collect_files(&path, pattern, files);
            }
        } else if pattern.is_none_or(|p| p.matches(&name.to_string_lossy())) {
            files.push(path);
        }
    }
}

/// Truncate a line if it exceeds MAX_LINE_LENGTH
fn truncate_line(line: &str) -> String {
    crate::utils::truncate_chars(line, MAX_LINE_LENGTH)
}

fn search_file(root: &Path, path: &Path, regex: &regex::Regex, matches: &mut Vec<String>) {
    // Binary and non-UTF-8 files are skipped.
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };
    let display_path = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/");

    for (line_num, line) in content.lines().enumerate() {
        if regex.is_match(line) {
            matches.push(format!(
                "{}:{}:{}",
                display_path,
                line_num + 1,
                truncate_line(line)
            ));
            if matches.len() > MAX_MATCHES {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_agent::PolicyFlags;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn alpha() {}\nfn beta() {}\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "alpha release\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_search_with_file_pattern() {
        let dir = fixture();
        let ctx = ToolContext::new(dir.path(), PolicyFlags::default());

        let params: ToolParams = [("path", "."), ("regex", "alpha"), ("file_pattern", "*.rs")]
            .into_iter()
            .collect();
        let output = GrepTool::new().execute(&params, &ctx).await.unwrap();
        assert_eq!(output, "src/lib.rs:1:fn alpha() {}");
    }

    #[tokio::test]
    async fn test_search_all_files() {
        let dir = fixture();
        let ctx = ToolContext::new(dir.path(), PolicyFlags::default());

        let params: ToolParams = [("path", "."), ("regex", "^(fn )?alpha")].into_iter().collect();
        let output = GrepTool::new().execute(&params, &ctx).await.unwrap();
        assert_eq!(output, "notes.md:1:alpha release\nsrc/lib.rs:1:fn alpha() {}");
    }

    #[tokio::test]
    async fn test_no_matches_and_bad_regex() {
        let dir = fixture();
        let ctx = ToolContext::new(dir.path(), PolicyFlags::default());

        let params: ToolParams = [("path", "."), ("regex", "gamma")].into_iter().collect();
        assert_eq!(
            GrepTool::new().execute(&params, &ctx).await.unwrap(),
            "No matches found"
        );

        let params: ToolParams = [("path", "."), ("regex", "(")].into_iter().collect();
        let err = GrepTool::new().execute(&params, &ctx).await.unwrap_err();
        assert!(err.to_string().starts_with("Invalid regex pattern"));
    }
}
