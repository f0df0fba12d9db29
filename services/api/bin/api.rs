//! Main Entrypoint for the Interview API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the prompt templates.
//! 3. Initializing shared services (the chat client and compatibility checker).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use interview_api::{config::Config, router::create_router, state::AppState};
use interview_core::{
    compatibility::{CompatibilityPolicy, LlmCompatibilityChecker},
    llm_client::OpenAICompatibleClient,
    prompt::TemplatePrompts,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Load Prompts ---
    let prompts = TemplatePrompts::load_dir(&config.prompts_path).with_context(|| {
        format!(
            "Failed to load prompts from {}",
            config.prompts_path.display()
        )
    })?;

    // --- 4. Initialize Shared Services ---
    let api_key = config
        .api_key()
        .context("No API key configured for the selected provider")?;
    info!(provider = ?config.provider, "Using OpenAI-compatible provider.");
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(config.provider.api_base());

    let llm_client = Arc::new(OpenAICompatibleClient::new(
        openai_config.clone(),
        config.chat_model.clone(),
    ));
    let compatibility_client = Arc::new(OpenAICompatibleClient::new(
        openai_config,
        config.compatibility_model.clone(),
    ));

    let app_state = Arc::new(AppState {
        llm_client,
        compatibility: Arc::new(LlmCompatibilityChecker::new(compatibility_client)),
        compatibility_policy: CompatibilityPolicy::default(),
        prompts: Arc::new(prompts),
        settings: Arc::new(config.interview.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        compatibility_model = %config.compatibility_model,
        max_minutes = config.interview.max_duration_minutes,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
