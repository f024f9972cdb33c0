//! # Consult Eval Backend - Main Application Entry Point
//!
//! HTTP server for recording or synthesizing a doctor-patient conversation
//! transcript and scoring it against reference text.
//!
//! ## Application Architecture:
//! - **config**: Application configuration (TOML file + environment variables)
//! - **state**: Shared application state, metrics, and the cached language model
//! - **audio**: Microphone capture through cpal
//! - **recognition**: Remote speech-to-text API client
//! - **generation**: Local conversation synthesis with candle
//! - **scoring**: Word-error-rate accuracy and ROUGE summary metrics
//! - **workflow**: The evaluation pipeline tying the pieces together
//! - **handlers**: HTTP request handlers and the single-page UI
//! - **health**: Health and metrics endpoints
//! - **middleware**: Request logging and per-endpoint metrics collection
//! - **error**: Custom error types and HTTP error responses

mod audio;
mod config;
mod device;
mod error;
mod generation;
mod handlers;
mod health;
mod middleware;
mod recognition;
mod scoring;
mod state;
mod workflow;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use crate::config::AppConfig;
use crate::state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Global shutdown signal shared between the signal handler task and the
/// server supervision loop.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// The main application entry point.
///
/// ## What this function does:
/// 1. Loads configuration from files and environment variables
/// 2. Sets up structured logging
/// 3. Creates the shared application state all requests can access
/// 4. Configures the HTTP server with middleware and routes
/// 5. Handles graceful shutdown on SIGINT/SIGTERM
#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present; missing file is fine.
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting consult-eval-backend v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: {}:{}",
        config.server.host, config.server.port
    );

    let app_state = AppState::new(config.clone());
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        // The evaluation page is served from this process, but CORS stays open
        // so the API remains usable from an externally hosted frontend.
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::RequestTelemetry)
            // The single-page evaluation UI.
            .route("/", web::get().to(handlers::workflow_page))
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config))
                    .route("/workflow", web::post().to(handlers::run_workflow))
                    .route("/workflow/stop", web::post().to(handlers::stop_capture)),
            )
            // Health check at root level for load balancers and probes.
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Wait for either the server to finish (usually an error) or a shutdown
    // signal, whichever comes first.
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

/// Initialize the tracing (logging) system.
///
/// Reads `RUST_LOG` when set; otherwise defaults to debug-level logs for this
/// crate and info-level logs for actix.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consult_eval_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}

/// Install SIGTERM/SIGINT handlers that flip the global shutdown flag.
///
/// Graceful shutdown lets the server finish in-flight evaluation runs before
/// the process exits.
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

/// Wait until the shutdown flag is set, polling every 100ms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
