//! Approval policy for tool invocations

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::registry::{ToolCategory, ToolName};
use crate::session::Mode;
use crate::tool::ToolParams;

/// Returned when `plan_mode_respond` is used while acting
pub const PLAN_MODE_ONLY: &str = "Error: plan_mode_respond can only be used in PLAN MODE.";

/// Which categories of action run without asking the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyFlags {
    /// Approve everything (the old single switch)
    pub auto_approve: bool,
    pub read_files: bool,
    pub edit_files: bool,
    /// Commands the model marks as not needing approval
    pub execute_safe_commands: bool,
    pub execute_all_commands: bool,
    pub browser: bool,
    pub mcp: bool,
}

impl PolicyFlags {
    /// Flags that approve every category
    pub fn allow_all() -> Self {
        Self {
            auto_approve: true,
            ..Default::default()
        }
    }
}

/// A question put to the operator before a tool runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub tool: ToolName,
    /// What the tool is about to do, e.g. "run command"
    pub action: &'static str,
    /// The resource it acts on: a command line, path, URL or server
    pub target: String,
}

impl fmt::Display for ConfirmationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' ({})", self.action, self.target, self.tool)
    }
}

impl ConfirmationRequest {
    /// The text fed back to the model when the operator says no
    pub fn denial_message(&self) -> String {
        format!(
            "Denied: the user did not approve {} '{}' via {}.",
            self.action, self.target, self.tool
        )
    }
}

/// Asks the operator to approve an action.
///
/// Implementations block until they have an answer. Anything other than a
/// clear yes (including end of input) is a no.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool;
}

/// A confirmer that always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct StaticConfirmer(pub bool);

#[async_trait]
impl Confirmer for StaticConfirmer {
    async fn confirm(&self, _request: &ConfirmationRequest) -> bool {
        self.0
    }
}

/// What the policy says about an invocation before anyone is asked
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Approval {
    Proceed,
    Ask(ConfirmationRequest),
    Deny(String),
}

/// The settled outcome for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Decision {
    pub proceed: bool,
    pub denial: Option<String>,
}

impl Decision {
    pub fn proceed() -> Self {
        Self {
            proceed: true,
            denial: None,
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            proceed: false,
            denial: Some(message.into()),
        }
    }
}

/// Apply the flag matrix to an invocation without prompting anyone
pub(crate) fn evaluate(tool: ToolName, params: &ToolParams, flags: &PolicyFlags, mode: Mode) -> Approval {
    let auto = match tool.category() {
        ToolCategory::Meta | ToolCategory::Completion => return Approval::Proceed,
        ToolCategory::PlanResponse => {
            return if mode == Mode::Plan {
                Approval::Proceed
            } else {
                Approval::Deny(PLAN_MODE_ONLY.to_string())
            };
        }
        ToolCategory::Execute => {
            flags.execute_all_commands
                || (flags.execute_safe_commands && !requires_approval(params))
        }
        ToolCategory::Edit => flags.edit_files,
        ToolCategory::Read => flags.read_files,
        ToolCategory::Browser => flags.browser,
        ToolCategory::Mcp => flags.mcp,
    };

    if auto || flags.auto_approve {
        Approval::Proceed
    } else {
        Approval::Ask(request_for(tool, params))
    }
}

/// Settle an invocation, prompting the operator when the flags require it
pub(crate) async fn decide(
    tool: ToolName,
    params: &ToolParams,
    flags: &PolicyFlags,
    mode: Mode,
    confirmer: &dyn Confirmer,
) -> Decision {
    match evaluate(tool, params, flags, mode) {
        Approval::Proceed => Decision::proceed(),
        Approval::Deny(message) => Decision::deny(message),
        Approval::Ask(request) => {
            if confirmer.confirm(&request).await {
                Decision::proceed()
            } else {
                tracing::info!("Operator declined {}", request);
                Decision::deny(request.denial_message())
            }
        }
    }
}

/// The model's own `requires_approval` hint; anything but an explicit
/// "false" counts as needing approval.
fn requires_approval(params: &ToolParams) -> bool {
    params
        .get("requires_approval")
        .is_none_or(|v| !v.trim().eq_ignore_ascii_case("false"))
}

fn request_for(tool: ToolName, params: &ToolParams) -> ConfirmationRequest {
    let param = |key: &str| params.get_non_empty(key).map(str::trim);

    let (action, target) = match tool.category() {
        ToolCategory::Execute => ("running command", param("command").map(str::to_string)),
        ToolCategory::Edit => ("editing file", param("path").map(str::to_string)),
        ToolCategory::Read => ("reading", param("path").map(str::to_string)),
        ToolCategory::Browser => (
            "browser action",
            param("action").map(|action| match param("url") {
                Some(url) => format!("{} {}", action, url),
                None => action.to_string(),
            }),
        ),
        _ => (
            "MCP access to",
            param("server_name").map(|server| {
                match param("tool_name").or_else(|| param("uri")) {
                    Some(what) => format!("{}/{}", server, what),
                    None => server.to_string(),
                }
            }),
        ),
    };

    ConfirmationRequest {
        tool,
        action,
        target: target.unwrap_or_else(|| "(unspecified)".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ToolParams {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_meta_always_proceeds() {
        let flags = PolicyFlags::default();
        for tool in [
            ToolName::NewTask,
            ToolName::Condense,
            ToolName::ReportBug,
            ToolName::AskFollowupQuestion,
            ToolName::LoadMcpDocumentation,
            ToolName::AttemptCompletion,
        ] {
            assert_eq!(evaluate(tool, &ToolParams::new(), &flags, Mode::Act), Approval::Proceed);
        }
    }

    #[test]
    fn test_plan_mode_respond() {
        let flags = PolicyFlags::allow_all();
        assert_eq!(
            evaluate(ToolName::PlanModeRespond, &ToolParams::new(), &flags, Mode::Act),
            Approval::Deny(PLAN_MODE_ONLY.to_string())
        );
        assert_eq!(
            evaluate(ToolName::PlanModeRespond, &ToolParams::new(), &flags, Mode::Plan),
            Approval::Proceed
        );
    }

    #[test]
    fn test_execute_matrix() {
        let safe = params(&[("command", "ls"), ("requires_approval", "False")]);
        let risky = params(&[("command", "rm -rf build"), ("requires_approval", "true")]);
        let unhinted = params(&[("command", "make")]);

        let only_safe = PolicyFlags {
            execute_safe_commands: true,
            ..Default::default()
        };
        assert_eq!(evaluate(ToolName::ExecuteCommand, &safe, &only_safe, Mode::Act), Approval::Proceed);
        assert!(matches!(
            evaluate(ToolName::ExecuteCommand, &risky, &only_safe, Mode::Act),
            Approval::Ask(_)
        ));
        assert!(matches!(
            evaluate(ToolName::ExecuteCommand, &unhinted, &only_safe, Mode::Act),
            Approval::Ask(_)
        ));

        let all = PolicyFlags {
            execute_all_commands: true,
            ..Default::default()
        };
        assert_eq!(evaluate(ToolName::ExecuteCommand, &risky, &all, Mode::Act), Approval::Proceed);
        assert_eq!(
            evaluate(ToolName::ExecuteCommand, &risky, &PolicyFlags::allow_all(), Mode::Act),
            Approval::Proceed
        );
    }

    #[test]
    fn test_category_flags() {
        let p = params(&[("path", "a.txt")]);
        let flags = PolicyFlags {
            read_files: true,
            ..Default::default()
        };
        assert_eq!(evaluate(ToolName::ReadFile, &p, &flags, Mode::Act), Approval::Proceed);
        assert_eq!(evaluate(ToolName::SearchFiles, &p, &flags, Mode::Act), Approval::Proceed);
        assert!(matches!(evaluate(ToolName::WriteToFile, &p, &flags, Mode::Act), Approval::Ask(_)));
        assert!(matches!(evaluate(ToolName::BrowserAction, &p, &flags, Mode::Act), Approval::Ask(_)));
        assert!(matches!(evaluate(ToolName::UseMcpTool, &p, &flags, Mode::Act), Approval::Ask(_)));

        let flags = PolicyFlags {
            edit_files: true,
            browser: true,
            mcp: true,
            ..Default::default()
        };
        assert_eq!(evaluate(ToolName::NewRule, &p, &flags, Mode::Act), Approval::Proceed);
        assert_eq!(evaluate(ToolName::BrowserAction, &p, &flags, Mode::Act), Approval::Proceed);
        assert_eq!(evaluate(ToolName::AccessMcpResource, &p, &flags, Mode::Act), Approval::Proceed);
    }

    #[test]
    fn test_request_targets() {
        let flags = PolicyFlags::default();
        let ask = |tool, p: &ToolParams| match evaluate(tool, p, &flags, Mode::Act) {
            Approval::Ask(request) => request,
            other => panic!("expected Ask, got {:?}", other),
        };

        let req = ask(ToolName::ExecuteCommand, &params(&[("command", "cargo test")]));
        assert_eq!(req.target, "cargo test");

        let req = ask(
            ToolName::BrowserAction,
            &params(&[("action", "launch"), ("url", "https://example.com")]),
        );
        assert_eq!(req.target, "launch https://example.com");

        let req = ask(
            ToolName::AccessMcpResource,
            &params(&[("server_name", "weather"), ("uri", "weather://sf")]),
        );
        assert_eq!(req.target, "weather/weather://sf");

        let req = ask(ToolName::WriteToFile, &ToolParams::new());
        assert_eq!(req.target, "(unspecified)");
    }

    #[tokio::test]
    async fn test_decide_uses_confirmer() {
        let p = params(&[("path", "notes.md")]);
        let flags = PolicyFlags::default();

        let yes = decide(ToolName::WriteToFile, &p, &flags, Mode::Act, &StaticConfirmer(true)).await;
        assert_eq!(yes, Decision::proceed());

        let no = decide(ToolName::WriteToFile, &p, &flags, Mode::Act, &StaticConfirmer(false)).await;
        assert!(!no.proceed);
        let message = no.denial.unwrap();
        assert!(message.contains("notes.md"));
        assert!(message.contains("write_to_file"));
        assert!(!message.starts_with(crate::tool::ERROR_PREFIX));
    }
}
