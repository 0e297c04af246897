//! Resolves, approves and executes tool invocations, keeping error bookkeeping

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use futures::FutureExt;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::confirm::{self, Confirmer, PLAN_MODE_ONLY};
use crate::registry::{ToolName, ToolRegistry};
use crate::session::{Mode, Session};
use crate::tool::{ERROR_PREFIX, ToolCall, ToolContext, ToolError, ToolParams};

/// Failed patches on one file before suggesting a full rewrite
pub const DIFF_FAILURE_THRESHOLD: u32 = 2;

/// Failure messages of the patch tool that mean the diff itself did not apply
static DIFF_FAILURE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)search block.*not found",
        r"(?i)diff parsing failed",
        r"(?i)diff_blocks",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Whether a tool result reports a failure
pub fn is_error_result(output: &str) -> bool {
    output.starts_with(ERROR_PREFIX)
}

/// Whether a failed patch result means the search/replace blocks did not apply
pub fn is_diff_failure(output: &str) -> bool {
    DIFF_FAILURE_PATTERNS.iter().any(|re| re.is_match(output))
}

/// Suffix appended once a file has collected too many failed patches
pub fn escalation_suffix(path: &str) -> String {
    format!(
        "\nAdditionally, applying diffs to '{}' has failed multiple times. Consider reading the file content and using 'write_to_file' with the full desired content instead.",
        path
    )
}

/// How a dispatched invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
    /// The operator (or the mode) refused; not counted as an error
    Denied,
}

/// The result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub output: String,
    pub outcome: Outcome,
}

impl Dispatched {
    fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            outcome: Outcome::Success,
        }
    }

    fn error(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            outcome: Outcome::Error,
        }
    }

    fn denied(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            outcome: Outcome::Denied,
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome == Outcome::Error
    }
}

/// Runs tool invocations on behalf of the conversation driver
pub struct Dispatcher {
    registry: ToolRegistry,
    context: ToolContext,
    confirmer: Arc<dyn Confirmer>,
    /// Cached compiled JSON schema validators keyed by tool
    schema_cache: HashMap<ToolName, Arc<jsonschema::Validator>>,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry, context: ToolContext, confirmer: Arc<dyn Confirmer>) -> Self {
        let mut schema_cache = HashMap::new();
        for tool in registry.all() {
            let schema = tool.parameters_schema();
            match jsonschema::validator_for(&schema) {
                Ok(validator) => {
                    schema_cache.insert(tool.name(), Arc::new(validator));
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid parameter schema for '{}', skipping validation: {}",
                        tool.name(),
                        e
                    );
                }
            }
        }

        Self {
            registry,
            context,
            confirmer,
            schema_cache,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Run one invocation and update the session's bookkeeping.
    pub async fn dispatch(&self, call: &ToolCall, session: &mut Session) -> Dispatched {
        let named = call.tool();

        if named == Some(ToolName::AttemptCompletion) {
            return Dispatched::success(call.params.get("result").unwrap_or_default());
        }

        if named == Some(ToolName::PlanModeRespond) && session.mode != Mode::Plan {
            session.errors.record_error();
            return Dispatched::error(PLAN_MODE_ONLY);
        }

        let tool = match self.registry.resolve(&call.name) {
            Ok(tool) => Arc::clone(tool),
            Err(e) => {
                session.errors.record_error();
                tracing::warn!("Model invoked unknown tool '{}'", call.name);
                return Dispatched::error(e.to_string());
            }
        };
        let name = tool.name();

        if let Some(message) = self.validate(name, &call.params) {
            session.errors.record_error();
            return Dispatched::error(message);
        }

        let decision = confirm::decide(
            name,
            &call.params,
            &self.context.policy,
            session.mode,
            self.confirmer.as_ref(),
        )
        .await;
        if !decision.proceed {
            return Dispatched::denied(decision.denial.unwrap_or_default());
        }

        tracing::debug!("Executing {} with {} params", name, call.params.len());
        let raw = AssertUnwindSafe(tool.execute(&call.params, &self.context))
            .catch_unwind()
            .await;
        let (mut output, failed) = match raw {
            Ok(Ok(output)) => {
                let failed = is_error_result(&output);
                (output, failed)
            }
            Ok(Err(ToolError::Failed(message))) if is_error_result(&message) => (message, true),
            Ok(Err(e)) => (format!("{} executing {}: {}", ERROR_PREFIX, name, e), true),
            Err(panic) => (
                format!(
                    "{} executing {}: unexpected error: {}",
                    ERROR_PREFIX,
                    name,
                    panic_message(panic.as_ref())
                ),
                true,
            ),
        };

        let path = call.params.get_non_empty("path").map(str::trim);

        if failed {
            session.errors.record_error();
            if let (ToolName::ReplaceInFile, Some(path)) = (name, path) {
                if is_diff_failure(&output) {
                    let key = self.tracking_path(path).await;
                    let failures = session.errors.record_diff_failure(&key);
                    if failures >= DIFF_FAILURE_THRESHOLD {
                        tracing::warn!(
                            "Patching {} failed {} times, suggesting a full rewrite",
                            key.display(),
                            failures
                        );
                        output.push_str(&escalation_suffix(path));
                        session.errors.reset_diff_failures(&key);
                    }
                }
            }
            return Dispatched::error(output);
        }

        session.errors.reset();
        if let Some(path) = path {
            if name.is_file_mutation() {
                let key = self.tracking_path(path).await;
                session.errors.reset_diff_failures(&key);
            } else if name == ToolName::ReadFile {
                let key = self.tracking_path(path).await;
                session.memory.record_file_context(key, output.clone());
            }
        }
        Dispatched::success(output)
    }

    /// Absolute, symlink-resolved identity of a path parameter.
    ///
    /// Paths that do not exist fall back to lexical normalization.
    async fn tracking_path(&self, path: &str) -> PathBuf {
        let resolved = self.context.resolve_path(path);
        tokio::fs::canonicalize(&resolved).await.unwrap_or(resolved)
    }

    fn validate(&self, name: ToolName, params: &ToolParams) -> Option<String> {
        let validator = self.schema_cache.get(&name)?;
        let instance = params.to_json();
        let errors: Vec<String> = validator
            .iter_errors(&instance)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();

        if errors.is_empty() {
            None
        } else {
            Some(format!(
                "Error: Invalid parameters for {}:\n{}",
                name,
                errors.join("\n")
            ))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}
