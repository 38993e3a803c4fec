//! Agent pool endpoints

use crate::agents::{AgentConfig, AgentDescriptor, AgentSlot, AgentTask};
use crate::error::AppResult;
use crate::handlers::AppState;
use crate::router::ChatResult;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentDescriptor>,
    pub capacity: usize,
    pub active: usize,
    pub available: usize,
    pub slots: Vec<AgentSlot>,
}

pub async fn list(State(state): State<AppState>) -> Json<AgentsResponse> {
    let pool = state.bridge().agents();
    // Busy slots only; a full listing would be `capacity` entries long
    let slots = pool.slots().into_iter().filter(|s| s.busy).collect();
    Json(AgentsResponse {
        agents: pool.list_agents(),
        capacity: pool.capacity(),
        active: pool.active_count(),
        available: pool.available_slots(),
        slots,
    })
}

pub async fn create(
    State(state): State<AppState>,
    Json(config): Json<AgentConfig>,
) -> AppResult<(StatusCode, Json<AgentDescriptor>)> {
    let agent = state.bridge().agents().create_agent(config)?;
    Ok((StatusCode::CREATED, Json(agent)))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<AgentDescriptor>> {
    Ok(Json(state.bridge().agents().delete_agent(&id)?))
}

pub async fn assign_task(
    State(state): State<AppState>,
    Path(slot): Path<usize>,
    Json(task): Json<AgentTask>,
) -> AppResult<Json<ChatResult>> {
    let bridge = state.bridge();
    let result = bridge
        .agents()
        .assign_task(slot, task, bridge.chat())
        .await?;
    Ok(Json(result))
}
