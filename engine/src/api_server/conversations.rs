use axum::extract::{Query, State};
use axum::Json;
use sdk::types::{Conversation, ConversationPage};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::{ApiError, AppState, AuthUser, StatusResponse};

fn first_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "first_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

/// `POST /conversations`: one page, newest first. A failing store yields
/// an empty page rather than an error.
pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<ListRequest>,
) -> Json<ConversationPage> {
    match state
        .db
        .conversations()
        .fetch_user_conversations(request.user_id.as_deref(), request.page, request.page_size)
        .await
    {
        Ok(page) => Json(page),
        Err(e) => {
            error!("Error retrieving conversations: {:#}", e);
            Json(ConversationPage::empty())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UserConversationRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// `POST /conversations/user`: conversations matching the optional filters.
/// The body may be omitted.
pub async fn for_user(
    State(state): State<AppState>,
    _user: AuthUser,
    body: Option<Json<UserConversationRequest>>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let conversations = state
        .db
        .conversations()
        .fetch_user_conversation(request.user_id.as_deref(), request.session_id.as_deref())
        .await
        .map_err(|e| ApiError::Internal(format!("Error retrieving conversations: {:#}", e)))?;
    Ok(Json(conversations))
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub session_id: String,
    pub user_id: String,
}

/// `POST /conversations/delete`
pub async fn delete(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<DeleteQuery>,
) -> Json<StatusResponse> {
    info!(
        "Deleting conversation {} for {}",
        query.session_id, query.user_id
    );
    let result = state
        .db
        .conversations()
        .delete_user_conversation(&query.user_id, &query.session_id)
        .await;

    Json(match result {
        Ok(true) => StatusResponse::success(format!(
            "Conversation {} deleted successfully.",
            query.session_id
        )),
        Ok(false) => {
            warn!("Conversation {} not found", query.session_id);
            StatusResponse::error(format!("Conversation {} not found.", query.session_id))
        }
        Err(e) => {
            error!("Error deleting conversation {}: {:#}", query.session_id, e);
            StatusResponse::error(format!("Error deleting conversation: {}", e))
        }
    })
}
