//! Chat messages for agent tasks

use super::AgentTask;

/// Chat message sent for `task`
pub fn render(task: &AgentTask) -> String {
    match task {
        AgentTask::Chat { message } => message.clone(),
        AgentTask::Code { code, language } => {
            let language = language.as_deref().unwrap_or("this");
            format!(
                "Analyze {} code. Explain what it does and suggest concrete improvements:\n\n{}",
                language, code
            )
        }
        AgentTask::Debug { code, error } => match error {
            Some(error) => format!(
                "Debug this code. It fails with the following error:\n{}\n\nCode:\n\n{}",
                error, code
            ),
            None => format!("Debug this code and explain any problems you find:\n\n{}", code),
        },
        AgentTask::Fix { code, issue } => match issue {
            Some(issue) => format!(
                "Fix this issue in the code below: {}\nReturn the corrected code.\n\n{}",
                issue, code
            ),
            None => format!(
                "Find and fix any bugs in this code. Return the corrected code.\n\n{}",
                code
            ),
        },
        AgentTask::Other { payload, .. } => payload.clone(),
    }
}
