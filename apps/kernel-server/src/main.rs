// [[RARO]]/apps/kernel-server/src/main.rs
// Purpose: Entry point. Boots the cell orchestrator and its HTTP/WS surface.
// Architecture: Application Boot
// Dependencies: Axum, Tower, Tokio

mod config;
mod dag;
mod events;
mod fs_manager;
mod models;
mod runtime;
mod server;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::runtime::CellOrchestrator;
use crate::server::handlers;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(
                    if std::env::var("DEBUG").is_ok() {
                        "raro_kernel=debug".parse().unwrap()
                    } else {
                        "raro_kernel=info".parse().unwrap()
                    },
                )
                .add_directive("tower_http=info".parse().unwrap()),
        )
        .init();

    tracing::info!("Initializing RARO Kernel...");

    let project_id = std::env::var("PROJECT_ID").unwrap_or_else(|_| "default".to_string());
    let data_root = std::env::var("DATA_ROOT").unwrap_or_else(|_| "./data".to_string());
    let orchestrator = CellOrchestrator::new(data_root, &project_id);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/cell/start", post(handlers::start_cell))
        .route("/cell/state", get(handlers::cell_state))
        .route("/cell/stop/:cell_id", post(handlers::stop_cell))
        .route("/ws/cell/:cell_id", get(handlers::ws_cell_stream))
        .layer(cors)
        .with_state(orchestrator);

    let port = std::env::var("KERNEL_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to port");

    tracing::info!("RARO Kernel Server listening on http://{}", addr);

    axum::serve(listener, app).await.expect("Server error");
}
