//! Scripted, recording stub for the `ModelClient` trait.
//! Test-only: lets pipeline tests run without network or provider calls.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{LlmError, ModelClient};

type Handler = dyn Fn(&str, &str) -> Result<String, LlmError> + Send + Sync;

/// A `ModelClient` whose responses come from a closure over
/// `(system, prompt)`. Every call is recorded for assertions, which is how
/// tests prove the short-circuit and batching contracts.
pub struct StubModel {
    handler: Box<Handler>,
    calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: String,
    pub prompt: String,
}

impl StubModel {
    pub fn new(
        handler: impl Fn(&str, &str) -> Result<String, LlmError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Stub that returns the same response for every call.
    pub fn always(response: &str) -> Self {
        let response = response.to_string();
        Self::new(move |_, _| Ok(response.clone()))
    }

    /// Stub on which every call fails with a retryable provider error.
    pub fn failing() -> Self {
        Self::new(|_, _| {
            Err(LlmError::Api {
                status: 500,
                message: "stub outage".to_string(),
            })
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_with_system(&self, system: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.system == system)
            .count()
    }

    fn record(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
        });
        (self.handler)(system, prompt)
    }
}

#[async_trait]
impl ModelClient for StubModel {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.record(system, prompt)
    }

    async fn generate_from_image(
        &self,
        system: &str,
        prompt: &str,
        _media_type: &str,
        _base64_data: &str,
    ) -> Result<String, LlmError> {
        self.record(system, prompt)
    }
}
