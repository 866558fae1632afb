//! Persona Quiz · Backend
//!
//! - Axum HTTP + WebSocket API for building, importing and taking personality quizzes
//! - Hosted record/blob/auth backend (Supabase) when configured, in-memory otherwise
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT              : u16 (default 3000)
//!   SUPABASE_URL      : enables the hosted backend together with SUPABASE_KEY
//!   SUPABASE_KEY      : API key sent with every hosted request
//!   SUPABASE_BUCKET   : storage bucket override (default from config, "quiz-images")
//!   QUIZ_CONFIG_PATH  : path to TOML config (scoring policy, storage, dev users, quiz bank)
//!   LOG_LEVEL         : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT        : "pretty" (default) or "json"

mod telemetry;
mod util;
mod ids;
mod error;
mod domain;
mod records;
mod config;
mod transform;
mod scoring;
mod import;
mod builder;
mod session;
mod backend;
mod seeds;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: config, backend (hosted or seeded in-memory), id generator.
  let state = Arc::new(AppState::new());
  info!(target: "persona_quiz", backend = state.backend.label, "Application state ready");

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "persona_quiz", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "persona_quiz", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "persona_quiz", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "persona_quiz", "Shutdown signal received");
}
