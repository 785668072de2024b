//! Session routes: start a run, stream it, stop it, and the direct chat

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream};
use sdk::types::{
    default_agents, AgentConfig, ConversationMessage, StreamingEvent, UserMessage,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::DropGuard;
use tracing::{debug, info, warn};

use super::{ApiError, AppState, AuthUser, StatusResponse};
use crate::db::conversations::NewConversation;
use crate::llm::Message;
use crate::orchestrator::{session_workflow, Workflow, WorkflowEvent};
use crate::relay::{current_time, Relay};
use crate::session::{generate_session_name, SessionGuard};

/// Session that collects `/chat` exchanges
pub const DIRECT_SESSION: &str = "session_direct";

const DIRECT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Format your answers in Markdown.";

/// Agents as sent by clients: the UI posts a JSON-encoded string, API
/// callers may post the array itself
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AgentsField {
    List(Vec<AgentConfig>),
    Encoded(String),
}

impl AgentsField {
    pub fn into_agents(self) -> Result<Option<Vec<AgentConfig>>, ApiError> {
        match self {
            AgentsField::List(agents) => Ok(Some(agents)),
            AgentsField::Encoded(s) if s.trim().is_empty() => Ok(None),
            AgentsField::Encoded(s) => serde_json::from_str(&s)
                .map(Some)
                .map_err(|e| ApiError::BadRequest(format!("Invalid agents: {}", e))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageCreate {
    pub content: String,
    #[serde(default)]
    pub agents: Option<AgentsField>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessageResponse {
    pub id: String,
    pub content: String,
    /// The new session id
    pub response: String,
    pub timestamp: String,
    pub user_id: String,
}

/// `POST /start`: create the session record; the run starts when the
/// client opens `/chat-stream`
pub async fn start(
    State(state): State<AppState>,
    user: AuthUser,
    Json(message): Json<ChatMessageCreate>,
) -> Result<Json<ChatMessageResponse>, ApiError> {
    let user_id = message
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or(user.0);
    let agents = match message.agents {
        Some(field) => field.into_agents()?,
        None => None,
    }
    .unwrap_or_else(default_agents);
    let session_id = generate_session_name();
    let timestamp = current_time();

    info!(
        "Starting session {} for {} with {} agents",
        session_id,
        user_id,
        agents.len()
    );

    let conversation_id = uuid::Uuid::new_v4().to_string();
    state
        .db
        .conversations()
        .save_message(
            &user_id,
            &session_id,
            &UserMessage::new(&message.content).into(),
            NewConversation {
                id: Some(conversation_id),
                agents: Some(agents),
                run_mode_locally: Some(false),
                timestamp: timestamp.clone(),
            },
        )
        .await
        .map_err(|e| ApiError::Internal(format!("Error saving conversation: {:#}", e)))?;

    Ok(Json(ChatMessageResponse {
        id: uuid::Uuid::new_v4().to_string(),
        content: message.content,
        response: session_id,
        timestamp,
        user_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DirectMessage {
    pub content: String,
}

/// `POST /chat`: one model reply, no team. Both sides are logged under
/// [`DIRECT_SESSION`].
pub async fn chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(message): Json<DirectMessage>,
) -> Result<Json<StreamingEvent>, ApiError> {
    let conversations = state.db.conversations();
    let meta = || NewConversation {
        timestamp: current_time(),
        ..NewConversation::default()
    };

    conversations
        .save_message(
            &user.0,
            DIRECT_SESSION,
            &UserMessage::new(&message.content).into(),
            meta(),
        )
        .await
        .map_err(|e| ApiError::Internal(format!("Error saving message: {:#}", e)))?;

    let messages = [
        Message::system(DIRECT_SYSTEM_PROMPT),
        Message::user(&message.content),
    ];
    let reply = timeout(
        state.config.orchestrator.llm_timeout(),
        state.client.complete(&messages),
    )
    .await
    .map_err(|_| ApiError::Internal("LLM call timed out".to_string()))?
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    let response = StreamingEvent {
        time: current_time(),
        event_type: "DirectResponse".to_string(),
        source: "AgentFramework".to_string(),
        content: reply,
        stop_reason: None,
        models_usage: None,
        content_image: None,
        session_id: DIRECT_SESSION.to_string(),
        session_user: user.0.clone(),
    };
    conversations
        .save_message(
            &user.0,
            DIRECT_SESSION,
            &ConversationMessage::Event(response.clone()),
            meta(),
        )
        .await
        .map_err(|e| ApiError::Internal(format!("Error saving message: {:#}", e)))?;

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub session_id: String,
    pub user_id: String,
}

/// State carried between frames of one SSE stream
struct RunStream {
    events: ReceiverStream<WorkflowEvent>,
    relay: Relay,
    _session: SessionGuard,
    // Cancels the run when the client goes away
    _cancel_on_drop: DropGuard,
}

impl RunStream {
    /// Release the session and store whatever the workflow still emits
    /// after the terminal record. Those records are not streamed.
    fn drain(self) {
        let RunStream {
            mut events,
            relay,
            _session: session,
            _cancel_on_drop: cancel_on_drop,
        } = self;
        drop(session);
        // The run is past its terminal record; let it finish emitting
        cancel_on_drop.disarm();

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                relay.forward(event).await;
            }
            debug!("Session {} drained", relay.session_id());
        });
    }
}

/// `GET /chat-stream`: run the session's team and stream its records.
///
/// The stream ends after the first terminal record. Dropping the
/// connection cancels the run.
pub async fn chat_stream(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let conversation = state
        .db
        .conversations()
        .get_conversation(&query.user_id, &query.session_id)
        .await
        .map_err(|e| ApiError::Internal(format!("Error loading conversation: {:#}", e)))?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Conversation {} not found for user {}",
                query.session_id, query.user_id
            ))
        })?;

    let task = conversation
        .task()
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("Conversation has no task".to_string()))?;
    let agents = conversation.agents.clone().unwrap_or_else(default_agents);

    let workflow = session_workflow(
        &state.config,
        state.client.clone(),
        &agents,
        &query.user_id,
        &query.session_id,
    )?;

    let session = state.sessions.register(&query.session_id);
    let cancel = session.token();
    info!(
        "Streaming session {} with {} agents",
        query.session_id,
        workflow.participants().len()
    );

    let run = RunStream {
        events: workflow.run_stream(&task, cancel.clone()),
        relay: Relay::new(state.db.conversations(), &query.session_id, &query.user_id),
        _session: session,
        _cancel_on_drop: cancel.drop_guard(),
    };

    let frames = stream::unfold(Some(run), |run| async move {
        let mut run = run?;
        loop {
            let event = run.events.next().await?;
            let Some(record) = run.relay.forward(event).await else {
                continue;
            };
            let terminal = record.is_terminal();
            let frame = Event::default().json_data(&record).unwrap_or_else(|e| {
                warn!("Failed to encode {} record: {}", record.event_type, e);
                Event::default().comment("unencodable record")
            });
            if terminal {
                run.drain();
                return Some((Ok::<_, Infallible>(frame), None));
            }
            return Some((Ok::<_, Infallible>(frame), Some(run)));
        }
    });

    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Deserialize)]
pub struct StopQuery {
    pub session_id: String,
}

/// `GET /stop`: signal a running session. Best effort; the run notices at
/// its next await point.
pub async fn stop(State(state): State<AppState>, Query(query): Query<StopQuery>) -> Json<StatusResponse> {
    if state.sessions.cancel(&query.session_id) {
        Json(StatusResponse::success(format!(
            "Session {} cancelled successfully.",
            query.session_id
        )))
    } else {
        Json(StatusResponse::error("Cancellation token not found."))
    }
}
