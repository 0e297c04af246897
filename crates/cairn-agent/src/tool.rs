//! Tool trait, invocation types and the narrow context tools run in

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::confirm::PolicyFlags;
use crate::registry::ToolName;

/// A tool result whose text starts with this is a failure
pub const ERROR_PREFIX: &str = "Error:";

/// Parameters of one invocation, keyed by parameter name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolParams(BTreeMap<String, String>);

impl ToolParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// A parameter that is present and not blank
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// Interpret a parameter as a boolean ("true"/"yes"/"1")
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "1"
            )
        })
    }

    /// Set a parameter; a repeated name keeps the last value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The parameters as a JSON object of strings, for schema validation
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ToolParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A tool invocation extracted from an assistant reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The name exactly as the model wrote it
    pub name: String,
    pub params: ToolParams,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, params: ToolParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// The tool this call names, if it names one at all
    pub fn tool(&self) -> Option<ToolName> {
        ToolName::from_wire(&self.name)
    }
}

/// What a running tool may see: where it runs and what it is allowed to do
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub cwd: PathBuf,
    pub policy: PolicyFlags,
}

impl ToolContext {
    pub fn new(cwd: impl Into<PathBuf>, policy: PolicyFlags) -> Self {
        Self {
            cwd: cwd.into(),
            policy,
        }
    }

    /// Resolve a path parameter against the working directory.
    ///
    /// The result is absolute and lexically normalized; symlinks are not
    /// followed.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = path.trim();
        let expanded = match path.strip_prefix("~/") {
            Some(rest) => std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(rest))
                .unwrap_or_else(|| PathBuf::from(path)),
            None => PathBuf::from(path),
        };
        normalize_path(&self.cwd.join(expanded))
    }
}

/// Remove `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Failures a tool reports instead of a result string
#[derive(Error, Debug)]
pub enum ToolError {
    /// A fully formed message for the model
    #[error("{0}")]
    Failed(String),

    /// A parameter had an unusable value
    #[error("value error: {0}")]
    InvalidValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Outcome of a tool execution.
///
/// Tools may also report failure through an `Ok` string starting with
/// [`ERROR_PREFIX`]; the dispatcher treats both forms alike.
pub type ToolResult = std::result::Result<String, ToolError>;

/// Trait for executable tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Which tool this is
    fn name(&self) -> ToolName;

    /// Tool description for the system prompt
    fn description(&self) -> &str;

    /// JSON Schema for parameters (an object whose properties are strings)
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given parameters
    async fn execute(&self, params: &ToolParams, ctx: &ToolContext) -> ToolResult;
}

/// Type alias for a shared tool
pub type BoxedTool = Arc<dyn Tool>;

/// Build a parameter schema from `(name, description, required)` triples
pub fn string_params_schema(params: &[(&str, &str, bool)]) -> serde_json::Value {
    let properties: serde_json::Map<String, serde_json::Value> = params
        .iter()
        .map(|(name, description, _)| {
            (
                name.to_string(),
                serde_json::json!({ "type": "string", "description": description }),
            )
        })
        .collect();
    let required: Vec<&str> = params
        .iter()
        .filter(|(_, _, required)| *required)
        .map(|(name, _, _)| *name)
        .collect();

    let mut schema = serde_json::json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = serde_json::json!(required);
    }
    schema
}

/// Documentation for one parameter, as read back from a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDoc {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Parameter name to description pairs for prompts
pub fn param_docs(schema: &serde_json::Value) -> Vec<ParamDoc> {
    let required: Vec<&str> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default();

    schema
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|props| {
            props
                .iter()
                .map(|(name, prop)| ParamDoc {
                    name: name.clone(),
                    description: prop
                        .get("description")
                        .and_then(|d| d.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    required: required.contains(&name.as_str()),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool that echoes its arguments.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> ToolName {
            ToolName::NewTask
        }
        fn description(&self) -> &str {
            "Echoes input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            string_params_schema(&[("context", "Text to echo", true)])
        }
        async fn execute(&self, params: &ToolParams, _ctx: &ToolContext) -> ToolResult {
            params
                .get("context")
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidValue("missing context".into()))
        }
    }

    #[tokio::test]
    async fn test_execute_echo() {
        let ctx = ToolContext::new("/tmp", PolicyFlags::default());
        let params: ToolParams = [("context", "hello")].into_iter().collect();
        assert_eq!(EchoTool.execute(&params, &ctx).await.unwrap(), "hello");

        let err = EchoTool.execute(&ToolParams::new(), &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "value error: missing context");
    }

    #[test]
    fn test_params_helpers() {
        let mut params = ToolParams::new();
        params.insert("recursive", " True ");
        params.insert("path", "  ");
        params.insert("path", "src");
        assert_eq!(params.get_bool("recursive"), Some(true));
        assert_eq!(params.get_bool("missing"), None);
        assert_eq!(params.get_non_empty("path"), Some("src"));
        assert_eq!(params.len(), 2);
        assert_eq!(params.to_json(), serde_json::json!({"path": "src", "recursive": " True "}));
    }

    #[test]
    fn test_resolve_path() {
        let ctx = ToolContext::new("/work/project", PolicyFlags::default());
        assert_eq!(ctx.resolve_path("src/lib.rs"), PathBuf::from("/work/project/src/lib.rs"));
        assert_eq!(ctx.resolve_path("./a/../b.txt"), PathBuf::from("/work/project/b.txt"));
        assert_eq!(ctx.resolve_path("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn test_schema_docs() {
        let schema = EchoTool.parameters_schema();
        let docs = param_docs(&schema);
        assert_eq!(
            docs,
            vec![ParamDoc {
                name: "context".into(),
                description: "Text to echo".into(),
                required: true,
            }]
        );
    }

    #[test]
    fn test_call_resolves_alias() {
        let call = ToolCall::new("patch_file", ToolParams::new());
        assert_eq!(call.tool(), Some(ToolName::ReplaceInFile));
        assert_eq!(ToolCall::new("nope", ToolParams::new()).tool(), None);
    }
}
