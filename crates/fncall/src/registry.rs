use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{AgentError, AgentResult};
use crate::function::AgentFunction;
use crate::models::tool::FunctionDefinition;

/// Functions the agent may call, keyed by name, with the subset currently
/// offered to the model.
///
/// Enabled functions are kept in the order they were enabled, which is also the
/// order their definitions are sent to the model.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<AgentFunction>>,
    order: Vec<String>,
    enabled: Vec<String>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of functions, optionally enabling all of them
    /// in list order. Fails like [`FunctionRegistry::register`] on a repeated name.
    pub fn from_functions<I>(functions: I, enable: bool) -> AgentResult<Self>
    where
        I: IntoIterator<Item = Arc<AgentFunction>>,
    {
        let mut registry = Self::new();
        for function in functions {
            registry.register(function, enable)?;
        }
        Ok(registry)
    }

    /// Add a function, enabling it unless `enabled` is false
    pub fn register<F>(&mut self, function: F, enabled: bool) -> AgentResult<()>
    where
        F: Into<Arc<AgentFunction>>,
    {
        let function = function.into();
        let name = function.name().to_string();
        if self.functions.contains_key(&name) {
            return Err(AgentError::DuplicateName(name));
        }

        self.functions.insert(name.clone(), function);
        self.order.push(name.clone());
        if enabled {
            self.enabled.push(name);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<AgentFunction>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Names of all registered functions, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Names of the enabled functions, in the order they were enabled
    pub fn enabled(&self) -> &[String] {
        &self.enabled
    }

    /// Enable a function. Enabling an already enabled function keeps its position.
    pub fn enable(&mut self, name: &str) -> AgentResult<()> {
        self.ensure_exists(name)?;
        if !self.enabled.iter().any(|n| n == name) {
            self.enabled.push(name.to_string());
        }
        Ok(())
    }

    pub fn disable(&mut self, name: &str) -> AgentResult<()> {
        self.ensure_exists(name)?;
        self.enabled.retain(|n| n != name);
        Ok(())
    }

    pub fn is_enabled(&self, name: &str) -> AgentResult<bool> {
        self.ensure_exists(name)?;
        Ok(self.enabled.iter().any(|n| n == name))
    }

    pub fn enable_all(&mut self) {
        self.enabled = self.order.clone();
    }

    pub fn disable_all(&mut self) {
        self.enabled.clear();
    }

    /// Look up a function the model asked for; it must be registered and enabled
    pub fn resolve(&self, name: &str) -> AgentResult<&Arc<AgentFunction>> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| AgentError::UnknownFunction(name.to_string()))?;
        if !self.enabled.iter().any(|n| n == name) {
            return Err(AgentError::FunctionDisabled(name.to_string()));
        }
        Ok(function)
    }

    /// Definitions of the enabled functions, in enable order
    pub fn build_definitions(&self) -> Vec<FunctionDefinition> {
        self.enabled
            .iter()
            .filter_map(|name| self.functions.get(name))
            .map(|function| function.definition())
            .collect()
    }

    /// A registry sharing the same functions with its own enabled set
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    fn ensure_exists(&self, name: &str) -> AgentResult<()> {
        if self.functions.contains_key(name) {
            Ok(())
        } else {
            Err(AgentError::UnknownFunction(name.to_string()))
        }
    }
}
