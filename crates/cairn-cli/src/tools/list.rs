//! List directory tool

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;
use std::fs;
use std::path::Path;

/// Most entries returned by one listing
const MAX_ENTRIES: usize = 1000;

/// Directories skipped when listing recursively
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target"];

/// Tool for listing directory contents
pub struct ListTool;

impl ListTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ListTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> ToolName {
        ToolName::ListFiles
    }

    fn description(&self) -> &str {
        "List files and directories within a directory. Directories end with '/'. Set recursive to true to list everything below it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[
            ("path", "Directory to list (relative to the working directory)", true),
            ("recursive", "Whether to list recursively: true or false (default: false)", false),
        ])
    }

    async fn execute(&self, params: &ToolParams, ctx: &ToolContext) -> ToolResult {
        let path_str = params.get_non_empty("path").unwrap_or(".");
        let recursive = params.get_bool("recursive").unwrap_or(false);
        let path = ctx.resolve_path(path_str);

        if !path.exists() {
            return Err(ToolError::Failed(format!("Path does not exist: {}", path_str)));
        }
        if !path.is_dir() {
            return Err(ToolError::Failed(format!("Path is not a directory: {}", path_str)));
        }

        let mut entries = Vec::new();
        if recursive {
            collect_recursive(&path, &path, &mut entries)?;
        } else {
            collect_flat(&path, &mut entries)?;
        }
        entries.sort();

        if entries.is_empty() {
            return Ok("(empty directory)".to_string());
        }

        let truncated = entries.len() > MAX_ENTRIES;
        entries.truncate(MAX_ENTRIES);
        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n\n(showing first {} entries)", MAX_ENTRIES));
        }
        Ok(output)
    }
}

fn collect_flat(path: &Path, entries: &mut Vec<String>) -> Result<(), ToolError> {
    for entry in fs::read_dir(path)?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        entries.push(format_entry(name, &entry.path()));
    }
    Ok(())
}

fn collect_recursive(base: &Path, path: &Path, entries: &mut Vec<String>) -> Result<(), ToolError> {
    for entry in fs::read_dir(path)?.flatten() {
        if entries.len() > MAX_ENTRIES {
            break;
        }

        let full_path = entry.path();
        let relative = full_path
            .strip_prefix(base)
            .unwrap_or(&full_path)
            .to_string_lossy()
            .replace('\\', "/");
        entries.push(format_entry(relative, &full_path));

        let name = entry.file_name();
        let skipped = SKIPPED_DIRS.iter().any(|d| name == *d);
        if full_path.is_dir() && !skipped {
            // Unreadable subdirectories are listed but not descended into.
            let _ = collect_recursive(base, &full_path, entries);
        }
    }
    Ok(())
}

fn format_entry(name: String, path: &Path) -> String {
    if path.is_dir() {
        format!("{}/", name)
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_agent::PolicyFlags;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/nested/deep.rs"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_flat_listing_is_sorted() {
        let dir = fixture();
        let ctx = ToolContext::new(dir.path(), PolicyFlags::default());

        let params: ToolParams = [("path", ".")].into_iter().collect();
        let output = ListTool::new().execute(&params, &ctx).await.unwrap();
        assert_eq!(output, "a.txt\nb.txt\nsrc/");
    }

    #[tokio::test]
    async fn test_recursive_listing() {
        let dir = fixture();
        let ctx = ToolContext::new(dir.path(), PolicyFlags::default());

        let params: ToolParams = [("path", "."), ("recursive", "true")].into_iter().collect();
        let output = ListTool::new().execute(&params, &ctx).await.unwrap();
        assert_eq!(
            output,
            "a.txt\nb.txt\nsrc/\nsrc/lib.rs\nsrc/nested/\nsrc/nested/deep.rs"
        );
    }

    #[tokio::test]
    async fn test_not_a_directory() {
        let dir = fixture();
        let ctx = ToolContext::new(dir.path(), PolicyFlags::default());

        let params: ToolParams = [("path", "a.txt")].into_iter().collect();
        let err = ListTool::new().execute(&params, &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Path is not a directory: a.txt");
    }
}
