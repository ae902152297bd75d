use crate::api::ApiResponse;
use axum::{http::StatusCode, response::Json};
use tracing::{error, info, warn};

/// Failures surfaced by the generative-language layer.
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The endpoint rejected the request itself (400/401). Never retried.
    #[error("AI service rejected the request (HTTP {status}): {message}")]
    NonRetryableApi { status: u16, message: String },

    /// Timeouts, server errors, network failures, undecodable bodies.
    #[error("Transient AI service failure: {message}")]
    TransientApi { status: Option<u16>, message: String },

    #[error("Empty response from AI service")]
    EmptyResponse,
}

impl AiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AiError::TransientApi { .. })
    }

    /// Classify a non-success HTTP status from the endpoint.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 | 401 => AiError::NonRetryableApi { status, message },
            _ => AiError::TransientApi {
                status: Some(status),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::TransientApi {
            status: err.status().map(|s| s.as_u16()),
            message: err.without_url().to_string(),
        }
    }
}

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("AI service error: {0}")]
    AiServiceError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl From<AiError> for ApiError {
    fn from(err: AiError) -> Self {
        match err {
            AiError::InvalidArgument(msg) => ApiError::ValidationError(msg),
            other => ApiError::AiServiceError(other.to_string()),
        }
    }
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_type: String,
    pub user_friendly_message: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_type: resource_type.to_string(),
            user_friendly_message: None,
        }
    }

    pub fn with_user_message(mut self, message: &str) -> Self {
        self.user_friendly_message = Some(message.to_string());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        match &self {
            ApiError::ValidationError(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "Validation error"
                );
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(
                        context.user_friendly_message.unwrap_or_else(|| self.to_string()),
                    )),
                )
            }
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "Resource not found"
                );
                (
                    StatusCode::NOT_FOUND,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::AiServiceError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "AI service error"
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ApiResponse::error(context.user_friendly_message.unwrap_or_else(
                        || "AI service temporarily unavailable. Please try again.".to_string(),
                    ))),
                )
            }
        }
    }
}

/// Helper macro for structured error responses
#[macro_export]
macro_rules! api_error {
    (validation, $operation:expr, $resource_type:expr, $message:expr) => {
        $crate::errors::ApiError::ValidationError($message.to_string())
            .to_response_with_context($crate::errors::ErrorContext::new($operation, $resource_type))
    };

    (ai, $operation:expr, $resource_type:expr, $error:expr) => {
        $crate::errors::ApiError::from($error)
            .to_response_with_context($crate::errors::ErrorContext::new($operation, $resource_type))
    };
}
