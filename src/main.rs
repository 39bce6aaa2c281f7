//! # Analytics Chat Backend - Main Application Entry Point
//!
//! Entry point for the analytics-chat-backend web server. It sets up an
//! Actix-web HTTP server exposing three request handlers:
//!
//! - `POST /transcribe`: speech-to-text over an uploaded audio file
//! - `POST /upload`: file upload acknowledgment (byte-count echo)
//! - `POST /chat`: keyword-driven chat responder with canned chart/table payloads
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **state**: Shared application state and request metrics
//! - **health**: Health and metrics endpoints
//! - **middleware**: Request logging and metrics collection
//! - **handlers**: HTTP request handlers for the three endpoints
//! - **transcription**: Whisper model loading and inference (Candle-rs)
//! - **audio**: WAV decoding into model-ready samples
//! - **error**: Custom error types and HTTP error responses
//!
//! The Whisper model is loaded once at startup and shared across requests;
//! the handlers themselves hold no state between calls.

mod audio;
mod config;
mod device;
mod error;
mod handlers;
mod health;
mod middleware;
mod state;
mod transcription;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::{TranscriptionConfig, TranscriptionEngine};

/// Global shutdown flag set by the signal handler task and polled by main.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting analytics-chat-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    // Load the transcription model once, up front. Concurrent requests share
    // this engine instead of re-loading the model per call. A failed load is
    // not fatal: /upload and /chat do not depend on the model, and
    // /transcribe reports the unloaded engine as a server error.
    let device = device::select_device(&config.models.device);
    let engine = Arc::new(TranscriptionEngine::new(
        TranscriptionConfig::default(),
        device,
    ));

    match config.models.whisper_model.parse() {
        Ok(size) => {
            if let Err(e) = engine.load_model(size).await {
                warn!("Whisper model load failed, /transcribe will be unavailable: {:#}", e);
            }
        }
        Err(e) => {
            warn!("Invalid whisper model in configuration: {}", e);
        }
    }

    let app_state = AppState::new(config.clone(), engine);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::RequestTelemetry)
            // Public API surface used by the chat frontend
            .route("/transcribe", web::post().to(handlers::transcribe_audio))
            .route("/upload", web::post().to(handlers::upload_file))
            .route("/chat", web::post().to(handlers::chat))
            .route("/health", web::get().to(health::health_check))
            // Operational endpoints under /api/v1
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics)),
            )
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Race the server against the shutdown signal; whichever finishes first wins.
    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing subscriber for console logging.
///
/// `RUST_LOG` controls what gets logged; if unset, defaults to
/// "analytics_chat_backend=debug,actix_web=info".
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "analytics_chat_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Listen for SIGTERM/SIGINT and set the global shutdown flag.
fn setup_signal_handlers() {
    tokio::spawn(async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Poll the shutdown flag until it is set.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
