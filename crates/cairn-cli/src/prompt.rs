//! System prompt rendering

use std::fmt::Write;
use std::path::Path;

use cairn_agent::tool::param_docs;
use cairn_agent::{Mode, ToolRegistry};

use crate::context;

const PREAMBLE: &str = "You are cairn, a highly skilled software engineer with extensive knowledge in many programming languages, frameworks, design patterns, and best practices.";

const TOOL_USE: &str = "\
TOOL USE

You have access to a set of tools that are executed upon the user's approval. You can use one tool per message, and will receive the result of that tool use in the user's response. Use tools step-by-step to accomplish a given task, with each tool use informed by the result of the previous one.

# Tool Use Formatting

Tool use is formatted using XML-style tags. The tool name is the outer tag, and each parameter is enclosed within its own set of tags:

<tool_name>
<parameter1_name>value1</parameter1_name>
<parameter2_name>value2</parameter2_name>
</tool_name>

For example:

<read_file>
<path>src/main.rs</path>
</read_file>

The equivalent wrapped form is also accepted:

<tool_use>
<tool_name>read_file</tool_name>
<params><path>src/main.rs</path></params>
</tool_use>

Parameter values are plain text. Escape '<' as &lt; and '&' as &amp;, or wrap the value in <![CDATA[ ... ]]>. Text outside tool tags is shown to the user; you may also wrap it in <text_content>...</text_content>. Only the first tool use in a message is executed.";

const GUIDELINES: &str = "\
# Tool Use Guidelines

1. Assess what information you already have and what you still need.
2. Choose the tool that best fits the current step. Prefer list_files and search_files over shell commands for exploring.
3. Use one tool per message and wait for its result before continuing. Never assume a tool succeeded.
4. Read a file before editing it. Use replace_in_file for targeted changes and write_to_file for new files or complete rewrites.
5. When the task is done, present the result with attempt_completion.";

const MODES: &str = "\
ACT MODE V. PLAN MODE

In ACT MODE you use tools to accomplish the task and finish with attempt_completion.
In PLAN MODE you gather information and discuss a plan with the user through plan_mode_respond. plan_mode_respond is only available in PLAN MODE. The user switches between modes.";

/// Render the system prompt for the registered tools
pub fn build_system_prompt(registry: &ToolRegistry, mode: Mode, cwd: &Path) -> String {
    let mut prompt = String::new();
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\n====\n\n");
    prompt.push_str(TOOL_USE);
    prompt.push_str("\n\n# Tools\n");
    prompt.push_str(&tools_documentation(registry));
    prompt.push('\n');
    prompt.push_str(GUIDELINES);
    prompt.push_str("\n\n====\n\n");
    prompt.push_str(MODES);

    let _ = write!(
        prompt,
        "\n\nYou are starting in {} MODE.",
        mode.to_string().to_uppercase()
    );

    let _ = write!(
        prompt,
        "\n\n====\n\nSYSTEM INFORMATION\n\nOperating System: {}\nWorking directory: {}\nRelative paths are resolved against the working directory.",
        std::env::consts::OS,
        cwd.display()
    );

    if let Some(rules) = context::load_rules(cwd) {
        let _ = write!(prompt, "\n\n====\n\nPROJECT RULES\n\n{}", rules);
    }

    prompt
}

/// One section per tool: description, parameters and a usage example
pub fn tools_documentation(registry: &ToolRegistry) -> String {
    let mut docs = String::new();
    for tool in registry.all() {
        let name = tool.name();
        let params = param_docs(&tool.parameters_schema());

        let _ = write!(docs, "\n## {}\nDescription: {}\n", name, tool.description());
        if params.is_empty() {
            docs.push_str("Parameters: none\n");
        } else {
            docs.push_str("Parameters:\n");
            for p in &params {
                let _ = writeln!(
                    docs,
                    "- {}: ({}) {}",
                    p.name,
                    if p.required { "required" } else { "optional" },
                    p.description
                );
            }
        }

        let _ = writeln!(docs, "Usage:\n<{}>", name);
        for p in params.iter().filter(|p| p.required) {
            let _ = writeln!(docs, "<{0}>{0} here</{0}>", p.name);
        }
        let _ = writeln!(docs, "</{}>", name);
    }
    docs
}
