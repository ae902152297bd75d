#![allow(dead_code)]

use async_trait::async_trait;
use quiz_backend::{AiError, GenerationParams, TextGenerator};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A `TextGenerator` that replays canned outcomes and records every call.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<Option<String>, AiError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub prompt: String,
    pub params: Option<GenerationParams>,
    pub at: tokio::time::Instant,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<Option<String>, AiError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(Some(text.to_string()))])
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        params: Option<&GenerationParams>,
    ) -> Result<Option<String>, AiError> {
        self.calls.lock().unwrap().push(RecordedCall {
            prompt: prompt.to_string(),
            params: params.copied(),
            at: tokio::time::Instant::now(),
        });

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(transient(503)))
    }

    fn provider_name(&self) -> &'static str {
        "Scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

pub fn transient(status: u16) -> AiError {
    AiError::TransientApi {
        status: Some(status),
        message: format!("HTTP {}", status),
    }
}

pub fn timeout() -> AiError {
    AiError::TransientApi {
        status: None,
        message: "operation timed out".to_string(),
    }
}

pub fn rejected(status: u16) -> AiError {
    AiError::NonRetryableApi {
        status,
        message: "API key not valid".to_string(),
    }
}

/// A well-formed model reply with `count` questions.
pub fn questions_json(count: usize) -> String {
    let entries: Vec<String> = (1..=count)
        .map(|i| {
            format!(
                r#"{{"question":"Question {i}?","options":["Right {i}","Wrong {i}a","Wrong {i}b","Wrong {i}c"],"correctAnswer":"Right {i}"}}"#
            )
        })
        .collect();
    format!("[{}]", entries.join(","))
}
