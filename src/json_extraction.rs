use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::Question;

/// Number of options every multiple-choice question carries.
pub const OPTIONS_PER_QUESTION: usize = 4;

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("fenced json pattern"));
static FENCE_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json|```").expect("fence marker pattern"));
static LINE_COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\n\s*//.*$").expect("line comment pattern"));
static TRAILING_COMMA_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\}").expect("trailing comma pattern"));
static TRAILING_COMMA_ARRAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\]").expect("trailing comma pattern"));

/// Why a model response could not be turned into a question batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionFailure {
    #[error("response contained no text")]
    EmptyOutput,

    #[error("no JSON array or fenced JSON block found")]
    NoJsonFound,

    #[error("malformed JSON: {0}")]
    Malformed(String),

    #[error("question {index} is invalid: {reason}")]
    InvalidQuestion { index: usize, reason: String },

    #[error("generated {actual} questions instead of {expected}")]
    CountMismatch { expected: usize, actual: usize },
}

/// Locates, cleans and validates a question array embedded in free-form model text.
pub struct QuestionBatchParser;

impl QuestionBatchParser {
    /// Run the whole extraction for a batch of `expected` questions.
    pub fn parse_batch(
        raw: Option<&str>,
        expected: usize,
    ) -> Result<Vec<Question>, ExtractionFailure> {
        let text = match raw {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Err(ExtractionFailure::EmptyOutput),
        };

        let candidate =
            Self::extract_json_candidate(text).ok_or(ExtractionFailure::NoJsonFound)?;
        let cleaned = Self::clean_json(candidate);
        debug!(
            cleaned_json = %cleaned.chars().take(200).collect::<String>(),
            "Cleaned JSON candidate from model response"
        );

        let questions = Self::parse_questions(&cleaned)?;
        if questions.len() != expected {
            return Err(ExtractionFailure::CountMismatch {
                expected,
                actual: questions.len(),
            });
        }

        Ok(questions)
    }

    /// Greedy bracket match first, then a ```json fence.
    pub fn extract_json_candidate(content: &str) -> Option<&str> {
        if let Some(start) = content.find('[') {
            if let Some(end) = content.rfind(']') {
                if end > start {
                    return Some(&content[start..=end]);
                }
            }
        }

        FENCED_JSON
            .captures(content)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str())
    }

    /// Strip fence markers, line comments and trailing commas.
    pub fn clean_json(candidate: &str) -> String {
        let cleaned = FENCE_MARKERS.replace_all(candidate, "");
        let cleaned = LINE_COMMENTS.replace_all(&cleaned, "");
        let cleaned = TRAILING_COMMA_OBJECT.replace_all(&cleaned, "}");
        let cleaned = TRAILING_COMMA_ARRAY.replace_all(&cleaned, "]");
        cleaned.trim().to_string()
    }

    /// Parse a cleaned JSON array; one invalid entry rejects the whole batch.
    pub fn parse_questions(json: &str) -> Result<Vec<Question>, ExtractionFailure> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ExtractionFailure::Malformed(e.to_string()))?;

        let entries = value
            .as_array()
            .ok_or_else(|| ExtractionFailure::Malformed("expected a JSON array".to_string()))?;

        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                Self::validate_question(entry)
                    .map_err(|reason| ExtractionFailure::InvalidQuestion { index, reason })
            })
            .collect()
    }

    fn validate_question(entry: &Value) -> Result<Question, String> {
        let question = entry
            .get("question")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or("missing question text")?;

        let raw_options = entry
            .get("options")
            .and_then(Value::as_array)
            .ok_or("options is not an array")?;

        let mut options = Vec::with_capacity(raw_options.len());
        for option in raw_options {
            let option = option
                .as_str()
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .ok_or("option is not a non-empty string")?;
            options.push(option.to_string());
        }
        if options.len() != OPTIONS_PER_QUESTION {
            return Err(format!(
                "expected {} options, found {}",
                OPTIONS_PER_QUESTION,
                options.len()
            ));
        }

        let answer = entry
            .get("correctAnswer")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or("missing correctAnswer")?;

        // Normalise to the option's own spelling so answers compare exactly downstream.
        let folded = answer.to_lowercase();
        let correct_answer = options
            .iter()
            .find(|option| option.to_lowercase() == folded)
            .cloned()
            .ok_or_else(|| format!("correctAnswer '{}' is not one of the options", answer))?;

        Ok(Question {
            question: question.to_string(),
            options,
            correct_answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_QUESTION: &str = r#"[{"question":"Q1?","options":["A","B","C","D"],"correctAnswer":"A"}]"#;

    #[test]
    fn test_array_embedded_in_prose() {
        let raw = format!("Here you go: {}", ONE_QUESTION);
        let questions = QuestionBatchParser::parse_batch(Some(&raw), 1).unwrap();

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "Q1?");
        assert_eq!(questions[0].correct_answer, "A");
    }

    #[test]
    fn test_fenced_block_with_comments_and_trailing_commas() {
        let raw = r#"```json
[
  {
    "question": "  What is 2 + 2? ",
    // the model sometimes annotates
    "options": ["3", "4", "5", "6",],
    "correctAnswer": " 4 ",
  },
]
```"#;

        let questions = QuestionBatchParser::parse_batch(Some(raw), 1).unwrap();
        assert_eq!(questions[0].question, "What is 2 + 2?");
        assert_eq!(questions[0].options, vec!["3", "4", "5", "6"]);
        assert_eq!(questions[0].correct_answer, "4");
    }

    #[test]
    fn test_fence_used_when_no_brackets() {
        let candidate = QuestionBatchParser::extract_json_candidate(
            "intro ```json\n{\"question\": \"x\"}\n``` outro",
        );
        assert_eq!(candidate, Some("{\"question\": \"x\"}"));
    }

    #[test]
    fn test_no_json_found() {
        let result = QuestionBatchParser::parse_batch(Some("I cannot help with that."), 2);
        assert_eq!(result, Err(ExtractionFailure::NoJsonFound));
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(
            QuestionBatchParser::parse_batch(None, 1),
            Err(ExtractionFailure::EmptyOutput)
        );
        assert_eq!(
            QuestionBatchParser::parse_batch(Some("   \n"), 1),
            Err(ExtractionFailure::EmptyOutput)
        );
    }

    #[test]
    fn test_malformed_json() {
        let result = QuestionBatchParser::parse_batch(Some("[{\"question\": }]"), 1);
        assert!(matches!(result, Err(ExtractionFailure::Malformed(_))));
    }

    #[test]
    fn test_count_mismatch() {
        let result = QuestionBatchParser::parse_batch(Some(ONE_QUESTION), 3);
        assert_eq!(
            result,
            Err(ExtractionFailure::CountMismatch {
                expected: 3,
                actual: 1
            })
        );
    }

    #[test]
    fn test_one_invalid_entry_rejects_batch() {
        let raw = r#"[
            {"question":"Q1?","options":["A","B","C","D"],"correctAnswer":"A"},
            {"question":"","options":["A","B","C","D"],"correctAnswer":"A"}
        ]"#;
        let result = QuestionBatchParser::parse_batch(Some(raw), 2);
        assert!(matches!(
            result,
            Err(ExtractionFailure::InvalidQuestion { index: 1, .. })
        ));
    }

    #[test]
    fn test_options_must_be_array() {
        let raw = r#"[{"question":"Q?","options":"A,B,C,D","correctAnswer":"A"}]"#;
        let result = QuestionBatchParser::parse_batch(Some(raw), 1);
        assert!(matches!(
            result,
            Err(ExtractionFailure::InvalidQuestion { index: 0, .. })
        ));
    }

    #[test]
    fn test_answer_must_be_an_option() {
        let raw = r#"[{"question":"Q?","options":["A","B","C","D"],"correctAnswer":"E"}]"#;
        let result = QuestionBatchParser::parse_batch(Some(raw), 1);
        assert!(matches!(
            result,
            Err(ExtractionFailure::InvalidQuestion { index: 0, .. })
        ));
    }

    #[test]
    fn test_answer_matching_is_case_insensitive() {
        let raw = r#"[{"question":"Capital of France?","options":["Paris","Rome","Berlin","Madrid"],"correctAnswer":"paris"}]"#;
        let questions = QuestionBatchParser::parse_batch(Some(raw), 1).unwrap();
        assert_eq!(questions[0].correct_answer, "Paris");
    }

    #[test]
    fn test_answer_matching_folds_non_ascii_case() {
        let raw = r#"[{"question":"Saison?","options":["Été","Hiver","Printemps","Automne"],"correctAnswer":"été"}]"#;
        let questions = QuestionBatchParser::parse_batch(Some(raw), 1).unwrap();
        assert_eq!(questions[0].correct_answer, "Été");
    }

    #[test]
    fn test_wrong_option_count_rejected() {
        let raw = r#"[{"question":"Q?","options":["A","B"],"correctAnswer":"A"}]"#;
        assert!(QuestionBatchParser::parse_batch(Some(raw), 1).is_err());
    }

    #[test]
    fn test_non_array_json_is_malformed() {
        let raw = "```json\n{\"question\": \"Q?\"}\n```";
        let result = QuestionBatchParser::parse_batch(Some(raw), 1);
        assert!(matches!(result, Err(ExtractionFailure::Malformed(_))));
    }
}
