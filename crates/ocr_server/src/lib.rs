//! OCR backend: serves the model catalog and session history, and proxies
//! recognition requests to the upstream vision model.
pub mod config;
mod error;
mod routes;
mod session;
mod upstream;

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::{create_router, ServerState};
pub use session::{Session, SessionStore, SESSION_COOKIE};
pub use upstream::{ChatMessage, ChatRequest, ContentPart, UpstreamClient, DEFAULT_PROMPT};

use anyhow::Context;
use ocr_logging::ocr_info;
use tokio::net::TcpListener;

/// Binds `config.bind` and serves until Ctrl-C.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let bind = config.bind.clone();
    let state = ServerState::new(config).context("failed to build upstream client")?;
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    ocr_info!("OCR server listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    ocr_info!("OCR server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler we simply run until killed.
        std::future::pending::<()>().await;
    }
}
