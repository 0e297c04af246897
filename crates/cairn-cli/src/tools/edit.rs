//! File patching tool using SEARCH/REPLACE blocks

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;
use similar::TextDiff;
use tokio::fs;

const SEARCH_MARKER: &str = "------- SEARCH";
const DIVIDER_MARKER: &str = "=======";
const REPLACE_MARKER: &str = "+++++++ REPLACE";

/// Longest diff shown in a result, in lines
const MAX_DIFF_LINES: usize = 200;

/// One SEARCH/REPLACE pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub search: String,
    pub replace: String,
}

/// Tool for targeted edits to existing files
pub struct EditTool;

impl EditTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EditTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> ToolName {
        ToolName::ReplaceInFile
    }

    fn description(&self) -> &str {
        "Replace sections of an existing file using SEARCH/REPLACE blocks. Each block has the form:\n------- SEARCH\n[exact content to find]\n=======\n[new content]\n+++++++ REPLACE\nSearch text must match the file exactly, including whitespace. Blocks are applied in order and each replaces only the first match."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[
            ("path", "Path of the file to modify (relative to the working directory)", true),
            ("diff", "One or more SEARCH/REPLACE blocks", false),
        ])
    }

    async fn execute(&self, params: &ToolParams, ctx: &ToolContext) -> ToolResult {
        let path_str = params
            .get_non_empty("path")
            .ok_or_else(|| ToolError::InvalidValue("missing 'path'".into()))?;
        let diff = params
            .get("diff")
            .or_else(|| params.get("diff_blocks"))
            .ok_or_else(|| {
                ToolError::Failed("Diff parsing failed: no 'diff' parameter was given".into())
            })?;
        let blocks = parse_blocks(diff).map_err(ToolError::Failed)?;

        let path = ctx.resolve_path(path_str);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::Failed(format!("Failed to read file {}: {}", path_str, e)))?;

        let new_content = apply_blocks(&content, &blocks, path_str).map_err(ToolError::Failed)?;
        if new_content == content {
            return Ok(format!(
                "No changes made to {}. The replacement produced identical content.",
                path_str
            ));
        }

        fs::write(&path, &new_content)
            .await
            .map_err(|e| ToolError::Failed(format!("Failed to write file {}: {}", path_str, e)))?;

        Ok(format!(
            "Successfully applied {} block(s) to {}.\n\nDiff:\n{}",
            blocks.len(),
            path_str,
            generate_diff(&content, &new_content, path_str)
        ))
    }
}

/// Split a diff parameter into its blocks
pub fn parse_blocks(diff: &str) -> Result<Vec<Block>, String> {
    enum State {
        Outside,
        Search(Vec<String>),
        Replace(Vec<String>, Vec<String>),
    }

    let mut blocks = Vec::new();
    let mut state = State::Outside;

    for line in diff.lines() {
        let marker = line.trim_end();
        state = match state {
            State::Outside if marker == SEARCH_MARKER => State::Search(Vec::new()),
            State::Outside => State::Outside,
            State::Search(search) if marker == DIVIDER_MARKER => {
                State::Replace(search, Vec::new())
            }
            State::Search(mut search) => {
                search.push(line.to_string());
                State::Search(search)
            }
            State::Replace(search, replace) if marker == REPLACE_MARKER => {
                blocks.push(Block {
                    search: search.join("\n"),
                    replace: replace.join("\n"),
                });
                State::Outside
            }
            State::Replace(search, mut replace) => {
                replace.push(line.to_string());
                State::Replace(search, replace)
            }
        };
    }

    if !matches!(state, State::Outside) {
        return Err(format!(
            "Diff parsing failed: block {} is not terminated by '{}'",
            blocks.len() + 1,
            REPLACE_MARKER
        ));
    }
    if blocks.is_empty() {
        return Err(format!(
            "Diff parsing failed: no '{}' / '{}' / '{}' blocks found",
            SEARCH_MARKER, DIVIDER_MARKER, REPLACE_MARKER
        ));
    }
    if let Some(n) = blocks.iter().position(|b| b.search.is_empty()) {
        return Err(format!("Diff parsing failed: search text of block {} is empty", n + 1));
    }
    Ok(blocks)
}

/// Apply blocks in order, each to the first occurrence of its search text
pub fn apply_blocks(content: &str, blocks: &[Block], path: &str) -> Result<String, String> {
    let mut text = content.to_string();
    for (i, block) in blocks.iter().enumerate() {
        if !text.contains(&block.search) {
            return Err(format!(
                "Search block {} not found in {}. The search text must match the file exactly, including whitespace and indentation.",
                i + 1,
                path
            ));
        }
        text = text.replacen(&block.search, &block.replace, 1);
    }
    Ok(text)
}

/// Generate a unified diff string
fn generate_diff(old: &str, new: &str, path: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let unified = diff
        .unified_diff()
        .context_radius(3)
        .header(path, path)
        .to_string();

    let lines: Vec<&str> = unified.lines().collect();
    if lines.len() > MAX_DIFF_LINES {
        let mut shown = lines[..MAX_DIFF_LINES].join("\n");
        shown.push_str("\n... (diff truncated)");
        shown
    } else {
        unified
    }
}
