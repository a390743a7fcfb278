use std::process::ExitCode;

use anyhow::Result;

use jarvis_control::Assistant;

use super::{emit, print_json};

pub async fn exec(assistant: &Assistant, user: &str, command: &str) -> Result<ExitCode> {
    let result = assistant.execute_command(user, command).await;
    print_json(&result, result.success)
}

pub async fn interpret(assistant: &Assistant, user: &str, request: &str) -> Result<ExitCode> {
    let result = assistant.interpret(user, request).await;
    print_json(&result, result.success)
}

pub async fn ask(assistant: &Assistant, user: &str, request: &str) -> Result<ExitCode> {
    let result = assistant.run_natural_language(user, request).await;
    print_json(&result, result.success)
}

pub async fn batch(
    assistant: &Assistant,
    user: &str,
    name: &str,
    commands: &[String],
) -> Result<ExitCode> {
    emit(&assistant.execute_batch(user, name, commands).await)
}

pub async fn template(assistant: &Assistant, user: &str, name: &str) -> Result<ExitCode> {
    emit(&assistant.execute_template(user, name).await)
}
