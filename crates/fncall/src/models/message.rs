use serde::{Deserialize, Serialize};

use super::role::Role;

/// A request from the model to run one of the offered functions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRequest {
    /// The name of the function to run
    pub name: String,
    /// The arguments as the model produced them, a serialized JSON value
    pub arguments: String,
}

impl FunctionRequest {
    pub fn new<N: Into<String>, A: Into<String>>(name: N, arguments: A) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
/// A message to or from a chat model
pub enum Message {
    User {
        content: String,
    },
    System {
        content: String,
    },
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function_call: Option<FunctionRequest>,
    },
    /// The serialized output of a function the model asked for
    Function {
        name: String,
        content: String,
    },
}

impl Message {
    pub fn user<S: Into<String>>(content: S) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn system<S: Into<String>>(content: S) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Message::Assistant {
            content: Some(content.into()),
            function_call: None,
        }
    }

    /// An assistant message with no text that only requests a function
    pub fn function_call<N: Into<String>, A: Into<String>>(name: N, arguments: A) -> Self {
        Message::Assistant {
            content: None,
            function_call: Some(FunctionRequest::new(name, arguments)),
        }
    }

    pub fn function_result<N: Into<String>, C: Into<String>>(name: N, content: C) -> Self {
        Message::Function {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Attach a function request to an assistant message. Has no effect on other roles.
    pub fn with_function_call<N: Into<String>, A: Into<String>>(
        self,
        name: N,
        arguments: A,
    ) -> Self {
        match self {
            Message::Assistant { content, .. } => Message::Assistant {
                content,
                function_call: Some(FunctionRequest::new(name, arguments)),
            },
            other => other,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::User { .. } => Role::User,
            Message::System { .. } => Role::System,
            Message::Assistant { .. } => Role::Assistant,
            Message::Function { .. } => Role::Function,
        }
    }

    /// Get the text content, if the message has any
    pub fn content(&self) -> Option<&str> {
        match self {
            Message::User { content }
            | Message::System { content }
            | Message::Function { content, .. } => Some(content),
            Message::Assistant { content, .. } => content.as_deref(),
        }
    }

    pub fn function_request(&self) -> Option<&FunctionRequest> {
        match self {
            Message::Assistant { function_call, .. } => function_call.as_ref(),
            _ => None,
        }
    }
}
