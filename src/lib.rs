pub mod api;
pub mod config;
pub mod errors;
pub mod generation_service;
pub mod json_extraction;
pub mod llm_providers;
pub mod logging;
pub mod models;

pub use config::Config;
pub use errors::*;
pub use generation_service::{GenerationService, RetryPolicy};
pub use json_extraction::{ExtractionFailure, QuestionBatchParser};
pub use llm_providers::{GeminiProvider, GenerationParams, TextGenerator};
pub use models::*;
