// [[RARO]]/apps/kernel-server/src/server/handlers.rs
// Purpose: HTTP + WebSocket control surface for the cell orchestrator.
// Architecture: API Layer
// Dependencies: Axum, CellOrchestrator

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::json;

use crate::models::{CellConfig, PoolConfig};
use crate::runtime::CellOrchestrator;

#[derive(serde::Deserialize)]
pub struct CellStateQuery {
    cell_id: String,
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(serde::Deserialize)]
pub struct StartCellRequest {
    pool: PoolConfig,
    cell: CellConfig,
}

pub async fn start_cell(
    State(orchestrator): State<Arc<CellOrchestrator>>,
    Json(req): Json<StartCellRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    orchestrator
        .start_cell(req.pool, req.cell)
        .map(|cell_id| Json(json!({ "cell_id": cell_id })))
        .map_err(|e| {
            tracing::error!(error = %e, "failed to start cell");
            (StatusCode::BAD_REQUEST, e.to_string())
        })
}

pub async fn cell_state(
    State(orchestrator): State<Arc<CellOrchestrator>>,
    Query(query): Query<CellStateQuery>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    orchestrator
        .get_state(&query.cell_id)
        .map(|state| Json(serde_json::to_value(state).unwrap()))
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn stop_cell(
    State(orchestrator): State<Arc<CellOrchestrator>>,
    Path(cell_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    orchestrator
        .stop_cell(&cell_id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))
}

pub async fn ws_cell_stream(
    State(orchestrator): State<Arc<CellOrchestrator>>,
    Path(cell_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_cell_stream(socket, orchestrator, cell_id))
}

async fn handle_cell_stream(socket: WebSocket, orchestrator: Arc<CellOrchestrator>, cell_id: String) {
    let (mut sender, mut receiver) = socket.split();

    if let Some(state) = orchestrator.get_state(&cell_id) {
        let _ = sender
            .send(WsMessage::Text(
                json!({ "type": "state_snapshot", "state": state }).to_string(),
            ))
            .await;
    } else {
        let _ = sender
            .send(WsMessage::Text(json!({ "error": "cell not found" }).to_string()))
            .await;
        return;
    }

    let mut events = orchestrator.subscribe_events();
    loop {
        tokio::select! {
            msg = receiver.next() => {
                if msg.is_none() {
                    tracing::info!(cell_id, "client disconnected from cell stream");
                    break;
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) if event.cell_id == cell_id => {
                        if sender.send(WsMessage::Text(serde_json::to_string(&event).unwrap())).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(cell_id, skipped, "cell event stream lagged, events dropped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
