//! Spoken Turn - spoken dialogue session manager
//!
//! Runs one spoken dialogue session: a turn-taking state machine that
//! coordinates speech recognition, speech synthesis and a dialogue manager,
//! with an HTTP surface for the presentation layer and a terminal stand-in
//! for the microphone and loudspeaker.

mod api;
mod config;
mod dialogue;
mod runtime;
mod speech;
mod state_machine;

use api::{create_router, AppState};
use config::SessionConfig;
use dialogue::EchoDialogue;
use runtime::{ProductionRuntime, RuntimeSettings};
use speech::console::ConsoleBackend;
use speech::{AzureTokenSource, AzureVoiceCatalog};
use state_machine::SessionContext;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spoken_turn=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let config = SessionConfig::from_env();
    if config.subscription_key.is_none() {
        tracing::warn!("SPEECH_KEY is not set; token fetch will fail");
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        %session_id,
        language = %config.language,
        voice = config.voice.as_str(),
        region = %config.region,
        "Starting session"
    );

    // Collaborators
    let token_source =
        AzureTokenSource::new(config.token_endpoint.clone(), config.subscription_key.clone());
    let backend = ConsoleBackend::new(AzureVoiceCatalog::new(&config.region));

    let context =
        SessionContext::new(&session_id).with_passivity_timeout(config.passivity_timeout);
    let runtime = ProductionRuntime::new(
        context,
        token_source,
        backend.clone(),
        Box::new(EchoDialogue::new()),
        RuntimeSettings {
            language: config.language.clone(),
            voice_pattern: config.voice.clone(),
        },
    );
    let session = runtime.handle();

    tokio::spawn(runtime.run());
    tokio::spawn(backend.read_stdin(session.event_sender()));

    // HTTP surface
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(session))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    println!("Type /click to start the session. Lines without a leading / are spoken input.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
