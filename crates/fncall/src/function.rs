use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{AgentError, AgentResult, SchemaViolation, ValidationError};
use crate::models::tool::FunctionDefinition;
use crate::schema::{JsonSchemaCompiler, SchemaCompiler, Validator};

enum CallError {
    /// The validated input did not fit the implementation's input type
    Input(serde_json::Error),
    Failed(anyhow::Error),
}

type Handler = Box<dyn Fn(Value) -> BoxFuture<'static, Result<Value, CallError>> + Send + Sync>;

/// A function that a model can ask the agent to run.
///
/// Input is checked against `schema` before the implementation sees it. The
/// validator is compiled on first use and kept for the lifetime of the function.
pub struct AgentFunction {
    name: String,
    description: String,
    schema: Value,
    handler: Handler,
    compiler: Arc<dyn SchemaCompiler>,
    validator: OnceLock<Arc<dyn Validator>>,
}

impl AgentFunction {
    /// Create a function from an async implementation.
    ///
    /// The input type is deserialized from the validated arguments and the output is
    /// serialized back to a JSON value. Use `serde_json::Value` on either side to work
    /// with raw JSON.
    pub fn new<N, D, I, O, F, Fut>(name: N, description: D, schema: Value, implementation: F) -> Self
    where
        N: Into<String>,
        D: Into<String>,
        I: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
    {
        let handler: Handler = Box::new(move |value: Value| {
            let input = match serde_json::from_value::<I>(value) {
                Ok(input) => input,
                Err(e) => return future::ready(Err::<Value, _>(CallError::Input(e))).boxed(),
            };
            let output = implementation(input);
            async move {
                let output = output.await.map_err(CallError::Failed)?;
                serde_json::to_value(output).map_err(|e| CallError::Failed(e.into()))
            }
            .boxed()
        });

        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler,
            compiler: Arc::new(JsonSchemaCompiler),
            validator: OnceLock::new(),
        }
    }

    /// Use a different schema engine for this function
    pub fn with_compiler(mut self, compiler: Arc<dyn SchemaCompiler>) -> Self {
        self.compiler = compiler;
        self.validator = OnceLock::new();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// The wire definition offered to the model
    pub fn definition(&self) -> FunctionDefinition {
        FunctionDefinition::new(&self.name, &self.description, self.schema.clone())
    }

    /// Check the input against the schema, compiling it if needed.
    ///
    /// This does not need to be called before [`AgentFunction::run`].
    pub fn validate(&self, input: &Value) -> AgentResult<()> {
        self.validator()?
            .validate(input)
            .map_err(|violations| ValidationError::new(violations).into())
    }

    /// Validate the input and run the implementation
    pub async fn run(&self, input: Value) -> AgentResult<Value> {
        self.validate(&input)?;

        (self.handler)(input).await.map_err(|e| match e {
            CallError::Input(e) => ValidationError::new(vec![SchemaViolation::new(
                "",
                "#",
                "deserialize",
                e.to_string(),
            )])
            .into(),
            CallError::Failed(source) => AgentError::FunctionExecution {
                name: self.name.clone(),
                source,
            },
        })
    }

    fn validator(&self) -> AgentResult<Arc<dyn Validator>> {
        if let Some(validator) = self.validator.get() {
            return Ok(validator.clone());
        }

        // Compiling twice is harmless, the first stored validator wins
        let compiled =
            self.compiler
                .compile(&self.schema)
                .map_err(|e| AgentError::InvalidSchema {
                    name: self.name.clone(),
                    message: e.to_string(),
                })?;
        Ok(self.validator.get_or_init(|| compiled).clone())
    }
}

impl fmt::Debug for AgentFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentFunction")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
