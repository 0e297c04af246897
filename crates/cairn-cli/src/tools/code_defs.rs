//! Top-level definition listing for source files

use async_trait::async_trait;
use cairn_agent::tool::{Tool, ToolContext, ToolError, ToolParams, ToolResult, string_params_schema};
use cairn_agent::ToolName;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

const NO_DEFINITIONS: &str = "No source code definitions found.";
const SEPARATOR: &str = "|----";

/// Unindented lines that start a definition, per language
static DEFINITION_PATTERNS: LazyLock<Vec<(&'static [&'static str], Regex)>> = LazyLock::new(|| {
    let patterns: [(&'static [&'static str], &str); 4] = [
        (
            &["rs"],
            r"^(pub(\([^)]*\))?\s+)?((async|const|unsafe|extern\s+\S+)\s+)*(fn|struct|enum|trait|impl|mod|type|union|macro_rules!)[\s<]",
        ),
        (&["py"], r"^(async\s+)?(def|class)\s+\w+"),
        (
            &["js", "jsx", "ts", "tsx", "mjs", "cjs"],
            r"^(export\s+)?(default\s+)?(declare\s+)?(abstract\s+)?(async\s+)?(function\*?|class|interface|type|enum)\s+\w+",
        ),
        (&["go"], r"^(func|type)\s+"),
    ];
    patterns
        .into_iter()
        .filter_map(|(exts, p)| Regex::new(p).ok().map(|re| (exts, re)))
        .collect()
});

/// Tool for getting an overview of the definitions in a directory
pub struct CodeDefsTool;

impl CodeDefsTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CodeDefsTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for CodeDefsTool {
    fn name(&self) -> ToolName {
        ToolName::ListCodeDefinitionNames
    }

    fn description(&self) -> &str {
        "List top-level definitions (functions, classes, structs, traits and the like) in the Rust, Python, JavaScript/TypeScript and Go files directly inside a directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        string_params_schema(&[(
            "path",
            "Directory whose source files to scan (relative to the working directory)",
            true,
        )])
    }

    async fn execute(&self, params: &ToolParams, ctx: &ToolContext) -> ToolResult {
        let path_str = params.get_non_empty("path").unwrap_or(".");
        let dir = ctx.resolve_path(path_str);
        if !dir.is_dir() {
            return Err(ToolError::Failed(format!("Path is not a directory: {}", path_str)));
        }

        let mut files: Vec<_> = fs::read_dir(&dir)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let mut sections = Vec::new();
        for file in &files {
            let defs = definitions_in(file);
            if defs.is_empty() {
                continue;
            }
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let mut section = vec![name, SEPARATOR.to_string()];
            section.extend(defs.into_iter().map(|d| format!("|{}", d)));
            section.push(SEPARATOR.to_string());
            sections.push(section.join("\n"));
        }

        if sections.is_empty() {
            Ok(NO_DEFINITIONS.to_string())
        } else {
            Ok(sections.join("\n\n"))
        }
    }
}

/// Definition lines of one file; unsupported or unreadable files have none
fn definitions_in(path: &Path) -> Vec<String> {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return Vec::new();
    };
    let Some((_, regex)) = DEFINITION_PATTERNS.iter().find(|(exts, _)| exts.contains(&ext)) else {
        return Vec::new();
    };
    let Ok(source) = fs::read_to_string(path) else {
        return Vec::new();
    };

    source
        .lines()
        .filter(|line| regex.is_match(line))
        .map(|line| line.trim_end().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_agent::PolicyFlags;

    #[tokio::test]
    async fn test_lists_definitions_per_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lib.rs"),
            "use std::fmt;\n\npub struct Point {\n    x: i32,\n}\n\nimpl Point {\n    fn inner() {}\n}\n\npub(crate) async fn load() {}\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("app.py"),
            "import os\n\nclass App:\n    def run(self):\n        pass\n\ndef main():\n    pass\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "# fn not_code()\n").unwrap();
        let ctx = ToolContext::new(dir.path(), PolicyFlags::default());

        let params: ToolParams = [("path", ".")].into_iter().collect();
        let output = CodeDefsTool::new().execute(&params, &ctx).await.unwrap();

        assert_eq!(
            output,
            "app.py\n|----\n|class App:\n|def main():\n|----\n\n\
             lib.rs\n|----\n|pub struct Point {\n|impl Point {\n|pub(crate) async fn load() {}\n|----"
        );
    }

    #[tokio::test]
    async fn test_no_definitions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.json"), "{}").unwrap();
        let ctx = ToolContext::new(dir.path(), PolicyFlags::default());

        let params: ToolParams = [("path", ".")].into_iter().collect();
        let output = CodeDefsTool::new().execute(&params, &ctx).await.unwrap();
        assert_eq!(output, NO_DEFINITIONS);
    }

    #[test]
    fn test_javascript_and_go_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let js = dir.path().join("index.ts");
        std::fs::write(&js, "export default async function main() {}\nconst x = 1;\ninterface Shape {}\n").unwrap();
        assert_eq!(
            definitions_in(&js),
            vec!["export default async function main() {}", "interface Shape {}"]
        );

        let go = dir.path().join("main.go");
        std::fs::write(&go, "package main\n\nfunc main() {}\ntype Server struct{}\n").unwrap();
        assert_eq!(definitions_in(&go), vec!["func main() {}", "type Server struct{}"]);
    }
}
