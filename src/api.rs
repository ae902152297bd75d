use axum::{
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{
    errors::{ApiError, ErrorContext},
    generation_service::GenerationService,
    models::*,
};

// Import logging macros
use crate::{api_error, log_api_start, log_api_success, log_api_warn, log_validation};

/// Questions generated per document when the client does not say.
const DEFAULT_DOCUMENT_QUESTIONS: u32 = 5;

#[derive(Clone)]
pub struct AppState {
    pub generation_service: GenerationService,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

/// Unwrap a JSON body, turning axum's rejection into our error envelope.
fn json_body<T>(
    body: Result<Json<T>, JsonRejection>,
    operation: &str,
) -> Result<T, (StatusCode, Json<ApiResponse<()>>)> {
    body.map(|Json(request)| request).map_err(|rejection| {
        let message = rejection.body_text();
        log_validation!(failure, operation, error = message);
        api_error!(validation, operation, "request", message)
    })
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

// Question generation endpoints
pub async fn generate_mcq(
    State(state): State<AppState>,
    body: Result<Json<GenerateMcqRequest>, JsonRejection>,
) -> ApiResult<QuestionsResponse> {
    let request = json_body(body, "generate_mcq")?;

    let (Some(topic), Some(sub_topic), Some(count)) = (
        required(request.topic),
        required(request.sub_topic),
        request.number_of_questions,
    ) else {
        log_api_warn!("generate_mcq", "missing required parameters");
        return Err(api_error!(
            validation,
            "generate_mcq",
            "question",
            "Missing required parameters: topic, subTopic, numberOfQuestions"
        ));
    };

    log_api_start!("generate_mcq", topic = topic, count = count);

    match state
        .generation_service
        .generate_question_batch(&topic, &sub_topic, count)
        .await
    {
        Ok(batch) => {
            log_api_success!("generate_mcq", count = batch.questions.len(), batch.source.label());
            Ok(Json(ApiResponse::success(batch.into())))
        }
        Err(e) => Err(api_error!(ai, "generate_mcq", "question", e)),
    }
}

pub async fn generate_from_text(
    State(state): State<AppState>,
    body: Result<Json<GenerateFromTextRequest>, JsonRejection>,
) -> ApiResult<QuestionsResponse> {
    let request = json_body(body, "generate_from_text")?;

    let Some(text) = required(request.text) else {
        return Err(api_error!(
            validation,
            "generate_from_text",
            "document",
            "Document text is required"
        ));
    };
    let count = request.num_questions.unwrap_or(DEFAULT_DOCUMENT_QUESTIONS);

    log_api_start!("generate_from_text", topic = "document", count = count);

    match state
        .generation_service
        .generate_from_document_text(&text, count)
        .await
    {
        Ok(batch) => {
            log_api_success!("generate_from_text", count = batch.questions.len(), batch.source.label());
            Ok(Json(ApiResponse::success(batch.into())))
        }
        Err(e) => Err(api_error!(ai, "generate_from_text", "document", e)),
    }
}

// Free-text endpoints
pub async fn summarize(
    State(state): State<AppState>,
    body: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<SummaryResponse> {
    let request = json_body(body, "summarize")?;
    let Some(text) = required(request.text) else {
        return Err(api_error!(validation, "summarize", "summary", "Text is required"));
    };

    log_api_start!("summarize");

    match state.generation_service.summarize_text(&text).await {
        Ok(summary) => {
            log_api_success!("summarize", "summary generated");
            Ok(Json(ApiResponse::success(SummaryResponse { summary })))
        }
        Err(e) => Err(ApiError::from(e).to_response_with_context(
            ErrorContext::new("summarize", "summary")
                .with_user_message("Failed to summarize text"),
        )),
    }
}

pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let request = json_body(body, "chat")?;
    let Some(message) = required(request.message) else {
        log_api_warn!("chat", "chat request missing message");
        return Err(api_error!(validation, "chat", "message", "Message is required"));
    };

    log_api_start!("chat");

    match state
        .generation_service
        .chat_reply(&message, request.context.as_deref())
        .await
    {
        Ok(response) => {
            log_api_success!("chat", "reply generated");
            Ok(Json(ApiResponse::success(ChatResponse {
                response,
                category: request.category,
                interaction_count: request.interaction_count,
            })))
        }
        Err(e) => Err(ApiError::from(e).to_response_with_context(
            ErrorContext::new("chat", "message").with_user_message("Failed to generate response"),
        )),
    }
}

// Operational endpoints
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn status(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "status": "Server is running",
        "timestamp": Utc::now().to_rfc3339(),
        "provider": state.generation_service.provider_name(),
        "model": state.generation_service.model_name(),
    })))
}

pub async fn not_found(uri: Uri) -> (StatusCode, Json<ApiResponse<()>>) {
    ApiError::NotFound(format!("The requested endpoint {} does not exist", uri.path()))
        .to_response_with_context(ErrorContext::new("route", "endpoint"))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/generate-mcq", post(generate_mcq))
        .route("/api/generate-from-text", post(generate_from_text))
        .route("/api/summarize", post(summarize))
        .route("/api/chat", post(chat))
        .fallback(not_found)
        .with_state(state)
}

/// Whether `origin` matches the configured list. `*.example.app` entries match any subdomain.
pub fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|entry| match entry.strip_prefix("*.") {
        Some(suffix) => origin
            .split_once("://")
            .map(|(_, host)| host.ends_with(&format!(".{}", suffix)))
            .unwrap_or(false),
        None => entry == origin,
    })
}

pub fn cors_layer(allowed: &[String]) -> CorsLayer {
    if allowed.iter().any(|entry| entry == "*") {
        return CorsLayer::permissive();
    }

    let allowed = allowed.to_vec();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|origin| origin_allowed(origin, &allowed))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}
