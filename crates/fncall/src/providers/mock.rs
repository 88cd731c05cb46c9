use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::message::Message;
use crate::providers::base::{CompletionOptions, Provider, Usage};

/// A mock provider that returns pre-configured responses for testing
#[derive(Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Result<Message, String>>>>,
    calls: Arc<Mutex<Vec<CompletionOptions>>>,
    seen: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Like `new`, but an `Err` entry makes that call fail with the given message
    pub fn with_results(responses: Vec<Result<Message, String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            calls: Arc::new(Mutex::new(Vec::new())),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The options of every call made so far
    pub fn calls(&self) -> Vec<CompletionOptions> {
        self.calls.lock().unwrap().clone()
    }

    /// The conversation as it was sent on each call
    pub fn seen_messages(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        messages: &[Arc<Message>],
        options: &CompletionOptions,
    ) -> Result<(Message, Usage)> {
        self.calls.lock().unwrap().push(options.clone());
        self.seen
            .lock()
            .unwrap()
            .push(messages.iter().map(|m| m.as_ref().clone()).collect());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            return Ok((Message::assistant(""), Usage::default()));
        }
        match responses.remove(0) {
            Ok(message) => Ok((message, Usage::default())),
            Err(e) => Err(anyhow!(e)),
        }
    }
}
