use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use sdk::types::Team;
use tracing::info;

use super::{ApiError, AppState, StatusResponse};

const TEAM_NOT_FOUND: &str = "Team not found";

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Team>>, ApiError> {
    state
        .db
        .teams()
        .get_teams()
        .await
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("Error retrieving teams: {:#}", e)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> Result<Json<Team>, ApiError> {
    state
        .db
        .teams()
        .get_team(&team_id)
        .await
        .map_err(|e| ApiError::Internal(format!("Error retrieving team: {:#}", e)))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(TEAM_NOT_FOUND.to_string()))
}

/// `POST /teams`: a team posted without agents gets the default agents
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<Team>, JsonRejection>,
) -> Result<Json<Team>, ApiError> {
    let Json(team) = payload?;
    state
        .db
        .teams()
        .create_team(team)
        .await
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("Error creating team: {:#}", e)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
    payload: Result<Json<Team>, JsonRejection>,
) -> Result<Json<Team>, ApiError> {
    let Json(team) = payload?;
    info!("Updating team {}", team_id);
    state
        .db
        .teams()
        .update_team(&team_id, team)
        .await
        .map_err(|e| ApiError::Internal(format!("Error updating team: {:#}", e)))?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(TEAM_NOT_FOUND.to_string()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let deleted = state
        .db
        .teams()
        .delete_team(&team_id)
        .await
        .map_err(|e| ApiError::Internal(format!("Error deleting team: {:#}", e)))?;

    if !deleted {
        return Err(ApiError::NotFound(TEAM_NOT_FOUND.to_string()));
    }
    Ok(Json(StatusResponse::success(format!(
        "Team {} deleted successfully.",
        team_id
    ))))
}

/// `POST /initialize-teams`: seed the default team into an empty store
pub async fn initialize(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let created = state
        .db
        .teams()
        .initialize_teams()
        .await
        .map_err(|e| ApiError::Internal(format!("Error initializing teams: {:#}", e)))?;
    info!("Initialized teams, {} created", created);

    Ok(Json(StatusResponse::success(
        "Teams initialized successfully with Agent Framework.",
    )))
}
