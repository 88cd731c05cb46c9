use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single schema violation reported while validating function input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaViolation {
    /// JSON pointer to the offending part of the input
    pub instance_path: String,
    /// JSON pointer to the schema keyword that rejected it
    pub schema_path: String,
    /// The keyword that failed, e.g. `required` or `type`
    pub keyword: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new<I, S, K, M>(instance_path: I, schema_path: S, keyword: K, message: M) -> Self
    where
        I: Into<String>,
        S: Into<String>,
        K: Into<String>,
        M: Into<String>,
    {
        Self {
            instance_path: instance_path.into(),
            schema_path: schema_path.into(),
            keyword: keyword.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.instance_path.is_empty() {
            "/"
        } else {
            &self.instance_path
        };
        write!(f, "{} {} ({})", path, self.message, self.keyword)
    }
}

/// Input rejected by a function's schema.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid input: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<SchemaViolation>,
}

impl ValidationError {
    pub fn new(violations: Vec<SchemaViolation>) -> Self {
        Self { violations }
    }
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    if violations.is_empty() {
        return "no details reported".to_string();
    }
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Function \"{0}\" does not exist")]
    UnknownFunction(String),

    #[error("Function \"{0}\" is not enabled")]
    FunctionDisabled(String),

    #[error("Function \"{0}\" already exists")]
    DuplicateName(String),

    #[error("Failed to parse arguments for function \"{name}\"")]
    ArgumentParse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to run function \"{name}\"")]
    FunctionExecution {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Message not found in context")]
    MessageNotFound,

    #[error("Schema for function \"{name}\" is invalid: {message}")]
    InvalidSchema { name: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Model call failed")]
    Provider(#[source] anyhow::Error),
}

pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_standalone_errors_name_the_function() {
        let err = AgentError::UnknownFunction("lookup".to_string());
        assert_eq!(err.to_string(), "Function \"lookup\" does not exist");
        assert!(err.source().is_none());

        let err = AgentError::FunctionDisabled("lookup".to_string());
        assert_eq!(err.to_string(), "Function \"lookup\" is not enabled");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_wrapping_errors_keep_their_cause() {
        let parse = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let expected = parse.to_string();
        let err = AgentError::ArgumentParse {
            name: "lookup".to_string(),
            source: parse,
        };
        assert_eq!(err.source().unwrap().to_string(), expected);

        let err = AgentError::FunctionExecution {
            name: "lookup".to_string(),
            source: anyhow::anyhow!("disk full"),
        };
        assert_eq!(err.to_string(), "Failed to run function \"lookup\"");
        assert_eq!(err.source().unwrap().to_string(), "disk full");
    }

    #[test]
    fn test_validation_error_lists_violations() {
        let err = ValidationError::new(vec![
            SchemaViolation::new("", "#/required", "required", "must have property 'n'"),
            SchemaViolation::new("/m", "#/properties/m/type", "type", "must be string"),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid input: / must have property 'n' (required); /m must be string (type)"
        );

        let err: AgentError = err.into();
        assert!(matches!(err, AgentError::Validation(ref v) if v.violations.len() == 2));
    }
}
