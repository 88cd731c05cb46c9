use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::{json, Value};

use crate::models::message::Message;
use crate::models::tool::FunctionDefinition;

/// Convert internal messages to the OpenAI chat completions message format
pub fn messages_to_openai_spec(messages: &[Arc<Message>]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| match message.as_ref() {
            Message::User { content } => json!({"role": "user", "content": content}),
            Message::System { content } => json!({"role": "system", "content": content}),
            Message::Assistant {
                content,
                function_call,
            } => {
                let mut converted = json!({"role": "assistant", "content": content});
                if let Some(request) = function_call {
                    converted["function_call"] = json!({
                        "name": sanitize_function_name(&request.name),
                        "arguments": request.arguments,
                    });
                }
                converted
            }
            Message::Function { name, content } => json!({
                "role": "function",
                "name": sanitize_function_name(name),
                "content": content,
            }),
        })
        .collect()
}

/// Convert function definitions to OpenAI's `functions` request field
pub fn functions_to_openai_spec(functions: &[FunctionDefinition]) -> Result<Vec<Value>> {
    let mut names = HashSet::new();
    let mut result = Vec::new();

    for function in functions {
        if !is_valid_function_name(&function.name) {
            return Err(anyhow!(
                "Invalid function name '{}', it must match [a-zA-Z0-9_-]+",
                function.name
            ));
        }
        if !names.insert(&function.name) {
            return Err(anyhow!("Duplicate function name: {}", function.name));
        }

        result.push(json!({
            "name": function.name,
            "description": function.description,
            "parameters": function.schema,
        }));
    }

    Ok(result)
}

/// Convert OpenAI's API response to an assistant message
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("No message in response: {}", response))?;

    let content = original
        .get("content")
        .and_then(Value::as_str)
        .map(str::to_string);

    let function_call = match original.get("function_call") {
        Some(call) if !call.is_null() => {
            let name = call
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("Function call without a name: {}", call))?;
            // Arguments stay a raw string, the agent parses them
            let arguments = match call.get("arguments") {
                Some(Value::String(arguments)) => arguments.clone(),
                Some(Value::Null) | None => "{}".to_string(),
                Some(other) => other.to_string(),
            };
            Some(crate::models::message::FunctionRequest::new(name, arguments))
        }
        _ => None,
    };

    Ok(Message::Assistant {
        content,
        function_call,
    })
}

fn function_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid regex"))
}

fn sanitize_function_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn is_valid_function_name(name: &str) -> bool {
    function_name_pattern().is_match(name)
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}
