//! Voice-call assistant: a per-call Conversation Core that listens to
//! transcribed utterances, drives a model dialogue with action tags, and
//! performs shift lookups and cancellations against a shift-management
//! website, speaking replies back to the caller.

mod api;
mod audio;
mod chat;
mod config;
mod conversation;
mod date_reasoner;
mod session;
mod workflow;

use api::{create_router, AppState};
use chat::{Chat, HttpChat, LoggingChat};
use config::Config;
use session::SessionManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workflow::{LettreMailer, Mailer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "call_assistant=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Arc::new(Config::from_env());

    std::fs::create_dir_all(&config.cookie_store_dir)?;

    let large_chat: Arc<dyn Chat> = Arc::new(LoggingChat::new(Arc::new(HttpChat::new(
        &config.llm_endpoint,
        config.llm_api_key.clone(),
        config.large_model.clone(),
    ))));
    let small_chat: Arc<dyn Chat> = Arc::new(LoggingChat::new(Arc::new(HttpChat::new(
        &config.llm_endpoint,
        config.llm_api_key.clone(),
        config.small_model.clone(),
    ))));

    let mailer: Arc<dyn Mailer> = Arc::new(LettreMailer::new(&config.mail)?);

    let sessions = Arc::new(SessionManager::new(
        config.clone(),
        large_chat,
        small_chat,
        mailer,
    ));

    let state = AppState::new(sessions, config.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state).layer(cors).layer(compression);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.bind_port));
    tracing::info!("call assistant listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
