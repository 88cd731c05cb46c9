use std::sync::Arc;

use futures::stream::BoxStream;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{FunctionRequest, Message};
use crate::providers::base::{CompletionOptions, FunctionCallMode, ModelOptions, Provider};
use crate::registry::FunctionRegistry;

pub const DEFAULT_MAX_ROUNDS: usize = 5;

/// Settings fixed for the lifetime of an [`Agent`]
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// The maximum number of rounds in a run
    pub max_rounds: usize,
    pub description: Option<String>,
    /// Passed through to the provider on every call
    pub model: ModelOptions,
}

impl AgentConfig {
    pub fn new(model: ModelOptions) -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            description: None,
            model,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Per-run settings
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Set to `true` to stop the run before its next model or function call
    pub cancel: Option<watch::Receiver<bool>>,
    /// Overrides the agent's round limit for this run
    pub max_rounds: Option<usize>,
}

impl RunOptions {
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }
}

/// One message produced during a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunStep {
    /// The round that produced the message, starting at 1
    pub round: usize,
    pub message: Arc<Message>,
    /// True for a model message that did not ask for a function
    pub done: bool,
}

/// Agent drives a chat model through rounds of function calls
pub struct Agent {
    name: String,
    config: AgentConfig,
    provider: Box<dyn Provider>,
}

impl Agent {
    /// Create a new Agent with the specified provider
    pub fn new<S: Into<String>>(
        name: S,
        provider: Box<dyn Provider>,
        config: AgentConfig,
    ) -> AgentResult<Self> {
        validate_max_rounds(config.max_rounds)?;
        Ok(Self {
            name: name.into(),
            config,
            provider,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.config.description.as_deref()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the agent against a context.
    ///
    /// Each round asks the model for a message and appends it to the context. When the
    /// message requests a function, the function runs and its result is appended too.
    /// Every appended message is yielded as soon as it exists. The run ends after the
    /// last round, when cancelled, or with the first error; errors are never turned
    /// into messages.
    ///
    /// Cancellation is checked before each model call and again before running a
    /// requested function. Calls already in flight are not interrupted.
    pub fn run<'a>(
        &'a self,
        context: &'a mut Context,
        options: RunOptions,
    ) -> BoxStream<'a, AgentResult<RunStep>> {
        let max_rounds = options.max_rounds.unwrap_or(self.config.max_rounds);
        let cancel = options.cancel;

        Box::pin(async_stream::try_stream! {
            validate_max_rounds(max_rounds)?;

            for round in 1..=max_rounds {
                if is_cancelled(&cancel) {
                    info!(agent = %self.name, round, "run cancelled before model call");
                    break;
                }

                let message = self.complete_round(context, round, max_rounds).await?;
                let message = context.add_message(message);
                let request = message.function_request().cloned();

                yield RunStep {
                    round,
                    message,
                    done: request.is_none(),
                };

                let Some(request) = request else {
                    continue;
                };

                if is_cancelled(&cancel) {
                    info!(
                        agent = %self.name,
                        round,
                        function = %request.name,
                        "run cancelled before function call"
                    );
                    break;
                }

                let result = self.call_function(context.functions(), &request).await?;
                let result = context.add_message(result);

                yield RunStep {
                    round,
                    message: result,
                    done: false,
                };
            }
        })
    }

    async fn complete_round(
        &self,
        context: &Context,
        round: usize,
        max_rounds: usize,
    ) -> AgentResult<Message> {
        let built = context.build();
        let is_last_round = round >= max_rounds;

        let options = if is_last_round || built.functions.is_empty() {
            CompletionOptions {
                model: self.config.model.clone(),
                function_call: FunctionCallMode::None,
                functions: None,
            }
        } else {
            CompletionOptions {
                model: self.config.model.clone(),
                function_call: FunctionCallMode::Auto,
                functions: Some(built.functions),
            }
        };

        debug!(
            agent = %self.name,
            round,
            max_rounds,
            mode = %options.function_call,
            messages = built.messages.len(),
            "requesting completion"
        );

        let (message, usage) = self
            .provider
            .complete(built.messages, &options)
            .await
            .map_err(|e| {
                warn!(agent = %self.name, round, error = %e, "model call failed");
                AgentError::Provider(e)
            })?;

        debug!(agent = %self.name, round, ?usage, "completion received");
        Ok(message)
    }

    async fn call_function(
        &self,
        functions: &FunctionRegistry,
        request: &FunctionRequest,
    ) -> AgentResult<Message> {
        let function = functions.resolve(&request.name)?;

        let arguments: Value =
            serde_json::from_str(&request.arguments).map_err(|source| {
                AgentError::ArgumentParse {
                    name: request.name.clone(),
                    source,
                }
            })?;

        debug!(agent = %self.name, function = %request.name, "running function");
        let output = function.run(arguments).await?;

        Ok(Message::function_result(&request.name, into_content(output)))
    }
}

fn validate_max_rounds(max_rounds: usize) -> AgentResult<()> {
    if max_rounds == 0 {
        return Err(AgentError::InvalidConfig(
            "max_rounds must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Function output as message content: strings as-is, anything else as JSON
fn into_content(output: Value) -> String {
    match output {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
