use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;

use fncall::agent::{Agent, AgentConfig, RunOptions};
use fncall::context::Context;
use fncall::errors::AgentError;
use fncall::function::AgentFunction;
use fncall::models::message::Message;
use fncall::models::role::Role;
use fncall::providers::base::{
    CompletionOptions, FunctionCallMode, ModelOptions, Provider, Usage,
};

/// Replays a fixed script and remembers which functions were offered each call
#[derive(Clone, Default)]
struct ScriptedProvider {
    script: Arc<Mutex<VecDeque<Message>>>,
    offered: Arc<Mutex<Vec<(FunctionCallMode, Vec<String>)>>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Message>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Default::default()
        }
    }

    fn offered(&self) -> Vec<(FunctionCallMode, Vec<String>)> {
        self.offered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(
        &self,
        _messages: &[Arc<Message>],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage)> {
        let names = options
            .functions
            .iter()
            .flatten()
            .map(|f| f.name.clone())
            .collect();
        self.offered
            .lock()
            .unwrap()
            .push((options.function_call, names));

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Message::assistant("nothing left to say"));
        Ok((next, Usage::default()))
    }
}

#[derive(Deserialize)]
struct AddInput {
    a: i64,
    b: i64,
}

#[derive(Serialize)]
struct AddOutput {
    sum: i64,
}

fn add() -> AgentFunction {
    AgentFunction::new(
        "add",
        "Add two integers",
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"}
            },
            "required": ["a", "b"],
            "additionalProperties": false
        }),
        |input: AddInput| async move {
            anyhow::Ok(AddOutput {
                sum: input.a + input.b,
            })
        },
    )
}

fn shout() -> AgentFunction {
    AgentFunction::new(
        "shout",
        "Upper-case some text",
        json!({
            "type": "object",
            "properties": {"text": {"type": "string", "minLength": 1}},
            "required": ["text"]
        }),
        |input: serde_json::Value| async move {
            anyhow::Ok(input["text"].as_str().unwrap_or_default().to_uppercase())
        },
    )
}

fn agent(provider: &ScriptedProvider, max_rounds: usize) -> Agent {
    let config = AgentConfig::new(ModelOptions::new("test-model")).with_max_rounds(max_rounds);
    Agent::new("calculator", Box::new(provider.clone()), config).unwrap()
}

#[tokio::test]
async fn test_multi_round_conversation() -> Result<()> {
    let provider = ScriptedProvider::new(vec![
        Message::function_call("add", r#"{"a": 2, "b": 3}"#),
        Message::function_call("shout", r#"{"text": "five"}"#),
        Message::assistant("The answer is FIVE"),
    ]);
    let agent = agent(&provider, 3);

    let mut context = Context::with_messages(vec![
        Message::system("You are a calculator"),
        Message::user("What is 2 + 3? Shout it."),
    ]);
    context.add_function(add(), true)?;
    context.add_function(shout(), true)?;

    let steps: Vec<_> = agent
        .run(&mut context, RunOptions::default())
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;

    let summary: Vec<_> = steps
        .iter()
        .map(|s| (s.round, s.message.role(), s.message.content(), s.done))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, Role::Assistant, None, false),
            (1, Role::Function, Some(r#"{"sum":5}"#), false),
            (2, Role::Assistant, None, false),
            (2, Role::Function, Some("FIVE"), false),
            (3, Role::Assistant, Some("The answer is FIVE"), true),
        ]
    );

    // Everything the run produced was appended after the initial messages
    assert_eq!(context.messages().len(), 7);
    for (step, stored) in steps.iter().zip(&context.messages()[2..]) {
        assert!(Arc::ptr_eq(&step.message, stored));
    }

    let both = vec!["add".to_string(), "shout".to_string()];
    assert_eq!(
        provider.offered(),
        vec![
            (FunctionCallMode::Auto, both.clone()),
            (FunctionCallMode::Auto, both),
            (FunctionCallMode::None, vec![]),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_enable_order_is_offered_order() -> Result<()> {
    let provider = ScriptedProvider::new(vec![]);
    let agent = agent(&provider, 2);

    let mut context = Context::new();
    context.add_function(add(), false)?;
    context.add_function(shout(), false)?;
    context.functions_mut().enable("shout")?;
    context.functions_mut().enable("add")?;

    let mut stream = agent.run(&mut context, RunOptions::default().with_max_rounds(2));
    while let Some(step) = stream.next().await {
        step?;
    }
    drop(stream);

    let offered = provider.offered();
    assert_eq!(
        offered[0],
        (
            FunctionCallMode::Auto,
            vec!["shout".to_string(), "add".to_string()]
        )
    );
    Ok(())
}

#[tokio::test]
async fn test_invalid_arguments_end_the_run() -> Result<()> {
    let provider = ScriptedProvider::new(vec![Message::function_call(
        "add",
        r#"{"a": 1.5, "b": 2, "c": 3}"#,
    )]);
    let agent = agent(&provider, 3);
    let mut context = Context::new();
    context.add_function(add(), true)?;

    let results: Vec<_> = agent
        .run(&mut context, RunOptions::default())
        .collect()
        .await;

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    let Err(AgentError::Validation(error)) = &results[1] else {
        panic!("expected a validation error, got {:?}", results[1]);
    };
    let keywords: Vec<_> = error
        .violations
        .iter()
        .map(|v| v.keyword.as_str())
        .collect();
    assert!(keywords.contains(&"type"));
    assert!(keywords.contains(&"additionalProperties"));

    // The request stays in the context, no result was added
    assert_eq!(context.messages().len(), 1);
    assert_eq!(provider.offered().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_cancel_from_another_task() -> Result<()> {
    let provider = ScriptedProvider::new(vec![Message::function_call(
        "add",
        r#"{"a": 1, "b": 1}"#,
    )]);
    let agent = agent(&provider, 5);
    let mut context = Context::new();
    context.add_function(add(), true)?;

    let (cancel, receiver) = tokio::sync::watch::channel(false);
    let mut stream = agent.run(&mut context, RunOptions::default().with_cancel(receiver));

    let first = stream.next().await.unwrap()?;
    assert!(first.message.function_request().is_some());

    tokio::spawn(async move { cancel.send(true) }).await??;

    assert!(stream.next().await.is_none());
    drop(stream);

    assert_eq!(context.messages().len(), 1);
    assert_eq!(provider.offered().len(), 1);
    Ok(())
}
