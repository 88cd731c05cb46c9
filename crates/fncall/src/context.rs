use std::sync::Arc;

use crate::errors::{AgentError, AgentResult};
use crate::function::AgentFunction;
use crate::models::message::Message;
use crate::models::tool::FunctionDefinition;
use crate::registry::FunctionRegistry;

/// A snapshot of the context in the shape a provider expects
#[derive(Debug, Clone)]
pub struct BuiltContext<'a> {
    pub messages: &'a [Arc<Message>],
    pub functions: Vec<FunctionDefinition>,
}

/// The conversation so far, plus the functions the agent may call.
///
/// Messages are shared handles; a message is never changed in place but may be
/// swapped for another with [`Context::replace_message`].
#[derive(Debug, Clone, Default)]
pub struct Context {
    messages: Vec<Arc<Message>>,
    functions: FunctionRegistry,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages<I>(messages: I) -> Self
    where
        I: IntoIterator<Item = Message>,
    {
        Self {
            messages: messages.into_iter().map(Arc::new).collect(),
            functions: FunctionRegistry::new(),
        }
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn messages(&self) -> &[Arc<Message>] {
        &self.messages
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    /// Append a message and return the shared handle to it
    pub fn add_message<M: Into<Arc<Message>>>(&mut self, message: M) -> Arc<Message> {
        let message = message.into();
        self.messages.push(message.clone());
        message
    }

    /// Register a function, enabling it unless `enable` is false
    pub fn add_function<F>(&mut self, function: F, enable: bool) -> AgentResult<()>
    where
        F: Into<Arc<AgentFunction>>,
    {
        self.functions.register(function, enable)
    }

    /// Swap `original` (matched by identity, not by value) for `replacement`,
    /// keeping its position
    pub fn replace_message<M: Into<Arc<Message>>>(
        &mut self,
        original: &Arc<Message>,
        replacement: M,
    ) -> AgentResult<Arc<Message>> {
        let slot = self
            .messages
            .iter_mut()
            .find(|m| Arc::ptr_eq(m, original))
            .ok_or(AgentError::MessageNotFound)?;
        *slot = replacement.into();
        Ok(slot.clone())
    }

    pub fn build(&self) -> BuiltContext<'_> {
        BuiltContext {
            messages: &self.messages,
            functions: self.functions.build_definitions(),
        }
    }

    /// A new context with its own message list and enabled set, sharing the
    /// messages and functions themselves
    pub fn duplicate(&self) -> Self {
        Self {
            messages: self.messages.clone(),
            functions: self.functions.duplicate(),
        }
    }
}
