use anyhow::Result;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::{info, warn};

use quiz_backend::{
    api::{AppState, cors_layer, create_router},
    config::{Config, LoggingConfig},
    generation_service::{GenerationService, RetryPolicy},
    llm_providers::GeminiProvider,
    log_system_event,
    logging::init_logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let _guard = init_logging(&LoggingConfig::from_env())?;

    let config = Config::from_env()?;
    config.validate()?;

    log_system_event!(startup, component = "server", "Starting quiz backend server");

    let provider = GeminiProvider::new(&config.llm)?;
    let generation_service =
        GenerationService::new(Arc::new(provider)).with_retry_policy(RetryPolicy {
            max_attempts: config.llm.max_attempts,
            ..RetryPolicy::default()
        });

    info!(
        provider = generation_service.provider_name(),
        model = %generation_service.model_name(),
        "Initialized generation service"
    );

    let state = AppState {
        generation_service: generation_service.clone(),
    };

    let app = create_router(state)
        .layer(ServiceBuilder::new().layer(cors_layer(&config.server.cors_allowed_origins)));

    let addr = config.server.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server starting on {}", addr);

    // The probe only reports configuration health; requests are served either way.
    tokio::spawn(async move {
        if generation_service.test_api_connection().await {
            info!("Server is ready to handle requests");
        } else {
            warn!("Server started but API connection test failed - check your API key");
        }
    });

    axum::serve(listener, app).await?;

    Ok(())
}
