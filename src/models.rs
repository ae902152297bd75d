use serde::{Deserialize, Serialize};

use crate::errors::AiError;
use crate::json_extraction::ExtractionFailure;

/// A multiple-choice question as exchanged with the model and the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
}

/// Validated input of one question-batch generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topic: String,
    pub sub_topic: String,
    pub count: u32,
}

/// Upper bound on questions per batch; fallback batches are allocated up front.
pub const MAX_QUESTIONS_PER_BATCH: u32 = 50;

impl GenerationRequest {
    pub fn new(topic: &str, sub_topic: &str, count: u32) -> Result<Self, AiError> {
        if topic.trim().is_empty() {
            return Err(AiError::InvalidArgument(
                "topic must be a non-empty string".to_string(),
            ));
        }
        if sub_topic.trim().is_empty() {
            return Err(AiError::InvalidArgument(
                "subTopic must be a non-empty string".to_string(),
            ));
        }
        if count == 0 {
            return Err(AiError::InvalidArgument(
                "count must be a positive integer".to_string(),
            ));
        }
        if count > MAX_QUESTIONS_PER_BATCH {
            return Err(AiError::InvalidArgument(format!(
                "count must be at most {}",
                MAX_QUESTIONS_PER_BATCH
            )));
        }

        Ok(Self {
            topic: topic.trim().to_string(),
            sub_topic: sub_topic.trim().to_string(),
            count,
        })
    }
}

/// Why a batch was synthesized locally instead of taken from the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    RetriesExhausted,
    Extraction(ExtractionFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchSource {
    Model,
    Fallback(FallbackReason),
}

impl BatchSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, BatchSource::Fallback(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            BatchSource::Model => "model",
            BatchSource::Fallback(_) => "fallback",
        }
    }
}

/// Exactly `count` questions plus where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedBatch {
    pub questions: Vec<Question>,
    pub source: BatchSource,
}

// Request/response bodies of the HTTP surface

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMcqRequest {
    pub topic: Option<String>,
    pub sub_topic: Option<String>,
    pub number_of_questions: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFromTextRequest {
    pub text: Option<String>,
    pub num_questions: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<Question>,
    pub source: &'static str,
}

impl From<GeneratedBatch> for QuestionsResponse {
    fn from(batch: GeneratedBatch) -> Self {
        Self {
            source: batch.source.label(),
            questions: batch.questions,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizeRequest {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: Option<String>,
    pub context: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub interaction_count: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub category: Option<String>,
    pub interaction_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_wire_format() {
        let question = Question {
            question: "Q1?".to_string(),
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_answer: "A".to_string(),
        };

        let value = serde_json::to_value(&question).unwrap();
        assert_eq!(value["question"], "Q1?");
        assert_eq!(value["correctAnswer"], "A");
        assert!(value.get("correct_answer").is_none());
    }

    #[test]
    fn test_generation_request_validation() {
        assert!(GenerationRequest::new("Math", "Algebra", 3).is_ok());
        assert!(matches!(
            GenerationRequest::new("", "Algebra", 3),
            Err(AiError::InvalidArgument(_))
        ));
        assert!(matches!(
            GenerationRequest::new("Math", "   ", 3),
            Err(AiError::InvalidArgument(_))
        ));
        assert!(matches!(
            GenerationRequest::new("Math", "Algebra", 0),
            Err(AiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_generation_request_caps_batch_size() {
        assert!(GenerationRequest::new("Math", "Algebra", MAX_QUESTIONS_PER_BATCH).is_ok());
        assert!(matches!(
            GenerationRequest::new("Math", "Algebra", MAX_QUESTIONS_PER_BATCH + 1),
            Err(AiError::InvalidArgument(_))
        ));
        assert!(matches!(
            GenerationRequest::new("Math", "Algebra", u32::MAX),
            Err(AiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(request.message.as_deref(), Some("hi"));
        assert_eq!(request.interaction_count, 0);
        assert!(request.context.is_none());
    }
}
