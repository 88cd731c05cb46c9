//! These models represent the objects passed between the agent loop, the
//! function registry and the model providers.
//!
//! The internal shapes follow the chat-completions function calling format
//! closely; providers convert to their own wire formats in `providers::utils`.
pub mod message;
pub mod role;
pub mod tool;
