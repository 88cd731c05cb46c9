use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The wire description of a function offered to a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    /// The name of the function
    pub name: String,
    /// A description of what the function does
    pub description: String,
    /// JSON schema of the arguments the function accepts
    pub schema: Value,
}

impl FunctionDefinition {
    pub fn new<N, D>(name: N, description: D, schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        FunctionDefinition {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }
}
