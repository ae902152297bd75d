use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::errors::AiError;
use crate::json_extraction::{OPTIONS_PER_QUESTION, QuestionBatchParser};
use crate::llm_providers::{GenerationParams, TextGenerator};
use crate::models::{BatchSource, FallbackReason, GeneratedBatch, GenerationRequest, Question};
use crate::{log_llm_operation, log_performance};

/// Longest document excerpt fed into question generation.
pub const MAX_DOCUMENT_CHARS: usize = 4000;
/// Shortest cleaned document that is still worth generating questions from.
pub const MIN_DOCUMENT_CHARS: usize = 50;
const DOCUMENT_EXCERPT_CHARS: usize = 500;
const DOCUMENT_TOPIC: &str = "Document Analysis";
const PROBE_PROMPT: &str = "Test connection";

/// Attempt budget and backoff table for question generation.
///
/// After failed attempt `n` (1-based) the service sleeps `base_delay * 2^n`,
/// except after the last attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `attempt` failed, or `None` when the budget is spent.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.base_delay * 2u32.saturating_pow(attempt))
    }
}

#[derive(Clone)]
pub struct GenerationService {
    generator: Arc<dyn TextGenerator>,
    retry_policy: RetryPolicy,
}

impl GenerationService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Get the provider name for logging and status reporting
    pub fn provider_name(&self) -> &'static str {
        self.generator.provider_name()
    }

    /// Get the model name being used
    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Generate exactly `count` multiple-choice questions about `sub_topic`.
    ///
    /// Only argument errors and client-side rejections (400/401) are returned as
    /// errors. Transient failures are retried and, like unusable model output,
    /// end in a locally synthesized batch.
    pub async fn generate_question_batch(
        &self,
        topic: &str,
        sub_topic: &str,
        count: u32,
    ) -> Result<GeneratedBatch, AiError> {
        let request = GenerationRequest::new(topic, sub_topic, count)?;
        let prompt = build_question_prompt(&request);
        let started = Instant::now();

        info!(
            topic = %request.topic,
            sub_topic = %request.sub_topic,
            count = request.count,
            "Generating question batch"
        );

        for attempt in 1..=self.retry_policy.max_attempts {
            log_llm_operation!(
                start,
                "generate_questions",
                provider = self.provider_name(),
                attempt = attempt,
                max_attempts = self.retry_policy.max_attempts
            );

            match self
                .generator
                .generate(&prompt, Some(&GenerationParams::QUESTIONS))
                .await
            {
                Ok(text) => {
                    log_llm_operation!(
                        success,
                        "generate_questions",
                        provider = self.provider_name(),
                        duration_ms = started.elapsed().as_millis() as u64
                    );
                    return Ok(self.batch_from_response(&request, text.as_deref()));
                }
                Err(e) if !e.is_retryable() => {
                    log_llm_operation!(
                        error,
                        "generate_questions",
                        provider = self.provider_name(),
                        error = e,
                        attempt = attempt
                    );
                    return Err(e);
                }
                Err(e) => match self.retry_policy.delay_after(attempt) {
                    Some(delay) => {
                        log_llm_operation!(
                            retry,
                            "generate_questions",
                            error = e,
                            attempt = attempt,
                            delay_ms = delay.as_millis() as u64
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        log_llm_operation!(
                            error,
                            "generate_questions",
                            provider = self.provider_name(),
                            error = e,
                            attempt = attempt
                        );
                    }
                },
            }
        }

        log_llm_operation!(
            fallback,
            "generate_questions",
            reason = "all API attempts failed",
            count = request.count
        );
        Ok(GeneratedBatch {
            questions: create_fallback_questions(&request.sub_topic, request.count),
            source: BatchSource::Fallback(FallbackReason::RetriesExhausted),
        })
    }

    fn batch_from_response(&self, request: &GenerationRequest, text: Option<&str>) -> GeneratedBatch {
        debug!(
            raw_response = %text.unwrap_or_default().chars().take(500).collect::<String>(),
            "Raw LLM response for question generation"
        );

        match QuestionBatchParser::parse_batch(text, request.count as usize) {
            Ok(questions) => {
                info!(
                    sub_topic = %request.sub_topic,
                    question_count = questions.len(),
                    "Successfully generated quiz questions"
                );
                GeneratedBatch {
                    questions,
                    source: BatchSource::Model,
                }
            }
            Err(failure) => {
                log_llm_operation!(
                    fallback,
                    "generate_questions",
                    reason = failure,
                    count = request.count
                );
                GeneratedBatch {
                    questions: create_fallback_questions(&request.sub_topic, request.count),
                    source: BatchSource::Fallback(FallbackReason::Extraction(failure)),
                }
            }
        }
    }

    /// Generate questions from already-extracted document text.
    pub async fn generate_from_document_text(
        &self,
        text: &str,
        count: u32,
    ) -> Result<GeneratedBatch, AiError> {
        let cleaned = normalize_document_text(text);
        let char_count = cleaned.chars().count();

        debug!(
            original_length = text.len(),
            cleaned_length = char_count,
            "Prepared document text for question generation"
        );

        if char_count < MIN_DOCUMENT_CHARS {
            return Err(AiError::InvalidArgument(
                "Document text is too short to generate meaningful questions".to_string(),
            ));
        }

        let excerpt: String = cleaned.chars().take(DOCUMENT_EXCERPT_CHARS).collect();
        let sub_topic = format!("Based on this content: {}...", excerpt);

        self.generate_question_batch(DOCUMENT_TOPIC, &sub_topic, count).await
    }

    pub async fn summarize_text(&self, text: &str) -> Result<String, AiError> {
        if text.trim().is_empty() {
            return Err(AiError::InvalidArgument("text must not be empty".to_string()));
        }

        let prompt = format!(
            "Summarize the following text concisely while maintaining the key points and insights:\n\n{}",
            text
        );

        self.single_shot("summarize", &prompt, &GenerationParams::SUMMARY)
            .await
    }

    /// Open-ended chat-style reply, single attempt.
    pub async fn generate_text_response(&self, prompt: &str) -> Result<String, AiError> {
        self.single_shot("chat", prompt, &GenerationParams::CHAT).await
    }

    /// Conversational reply to `message`, optionally grounded in `context`.
    pub async fn chat_reply(&self, message: &str, context: Option<&str>) -> Result<String, AiError> {
        if message.trim().is_empty() {
            return Err(AiError::InvalidArgument("Message is required".to_string()));
        }

        let prompt = build_chat_prompt(message, context);
        self.generate_text_response(&prompt).await
    }

    async fn single_shot(
        &self,
        operation: &'static str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AiError> {
        let started = Instant::now();

        match self.generator.generate(prompt, Some(params)).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                log_performance!(operation, duration_ms = started.elapsed().as_millis() as u64);
                Ok(text)
            }
            Ok(_) => {
                warn!(operation = operation, "LLM returned no text");
                Err(AiError::EmptyResponse)
            }
            Err(e) => {
                log_llm_operation!(
                    error,
                    operation,
                    provider = self.provider_name(),
                    error = e,
                    attempt = 1
                );
                Err(e)
            }
        }
    }

    /// Probe the endpoint once. Failures are logged, never returned.
    pub async fn test_api_connection(&self) -> bool {
        info!(provider = self.provider_name(), model = %self.model_name(), "Testing LLM API connection");

        match self.generator.generate(PROBE_PROMPT, None).await {
            Ok(text) => {
                info!(has_text = text.is_some(), "API connection test successful");
                true
            }
            Err(e) => {
                error!(error = %e, "API connection test failed");
                false
            }
        }
    }
}

fn build_question_prompt(request: &GenerationRequest) -> String {
    format!(
        r#"Generate exactly {count} multiple choice questions about {sub_topic} in {topic}.

IMPORTANT: Return ONLY valid JSON array, no explanations or markdown.

Format:
[
  {{
    "question": "Question text?",
    "options": ["A", "B", "C", "D"],
    "correctAnswer": "A"
  }}
]

Each question must have exactly {options} options and correctAnswer must be the full text of one of them.

Generate {count} questions now:"#,
        count = request.count,
        sub_topic = request.sub_topic,
        topic = request.topic,
        options = OPTIONS_PER_QUESTION,
    )
}

fn build_chat_prompt(message: &str, context: Option<&str>) -> String {
    format!(
        r#"{}

User message: {}

Respond in a natural, conversational way as if this is a casual chat between friends.
Keep your response genuine and human-like without sounding like an AI assistant.
Use natural speech patterns, casual language, and avoid overly formal structures.
Don't label your response or use phrases like "As an AI" or "I'm happy to help."
Just answer directly and naturally like a human friend would."#,
        context.unwrap_or_default(),
        message
    )
}

/// Collapse whitespace runs and cap the length at `MAX_DOCUMENT_CHARS`.
pub fn normalize_document_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_DOCUMENT_CHARS)
        .collect()
}

/// Placeholder questions used when no model-derived batch is usable.
pub fn create_fallback_questions(sub_topic: &str, count: u32) -> Vec<Question> {
    (1..=count)
        .map(|n| {
            let options = vec![
                format!("Basic concept {}", n),
                format!("Advanced topic {}", n),
                format!("Related field {}", n),
                format!("Alternative approach {}", n),
            ];
            Question {
                question: format!("What is a key concept in {}?", sub_topic),
                correct_answer: options[0].clone(),
                options,
            }
        })
        .collect()
}
