//! REST handlers

use crate::{
    commands::{PostReplyCommand, SetStateCommand, StateSnapshot},
    error::ApiError,
    rest::extract::{context_blob, request_token, tenant_context, RawChannelId},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chatbridge_core::{Author, BridgeError, ChannelId, MessageId, NewMessage, Result};
use chatbridge_webhook::specialist_or_false;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

const SUCCESS: &str = "success";

#[derive(Debug, Deserialize)]
pub struct UpdateStateRequest {
    pub channel_id: RawChannelId,
    #[serde(default)]
    pub specialist_id: Option<String>,
    #[serde(default, alias = "context")]
    pub context_data: Option<Value>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseRequest {
    pub channel_id: RawChannelId,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub simulate_typing: bool,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetTypingRequest {
    pub channel_id: RawChannelId,
    #[serde(alias = "is_typing")]
    pub status: bool,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub channel_id: RawChannelId,
    pub author: Author,
    pub body: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StateUpdatedResponse {
    pub status: &'static str,
    pub channel_id: ChannelId,
    #[serde(serialize_with = "specialist_or_false")]
    pub active_specialist: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub status: &'static str,
    #[serde(serialize_with = "specialist_or_false")]
    pub active_specialist: Option<String>,
    pub context_data: Value,
}

impl From<StateSnapshot> for StateResponse {
    fn from(snapshot: StateSnapshot) -> Self {
        Self {
            status: SUCCESS,
            active_specialist: snapshot.active_specialist,
            context_data: snapshot.context_data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TypingResponse {
    pub status: &'static str,
    pub is_typing: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message_id: MessageId,
}

fn json_body<T>(body: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            warn!(error = %rejection, "Rejected malformed request body");
            Err(BridgeError::BadRequest(rejection.body_text()))
        }
    }
}

/// POST /n8n_bridge/update_state
pub async fn update_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Json<UpdateStateRequest>, JsonRejection>,
) -> std::result::Result<Json<StateUpdatedResponse>, ApiError> {
    let run = async {
        let request = json_body(body)?;
        let ctx = tenant_context(&headers);
        let token = request_token(&headers, &state.token_header, request.token);
        let command = SetStateCommand {
            channel_id: request.channel_id.parse()?,
            specialist: request.specialist_id,
            context: context_blob(request.context_data)?,
        };

        let updated = state
            .commands
            .set_state(&ctx, token.as_deref(), command)
            .await?;
        Ok::<_, BridgeError>(StateUpdatedResponse {
            status: SUCCESS,
            channel_id: updated.channel_id,
            active_specialist: updated.specialist().map(String::from),
        })
    };

    run.await.map(Json).map_err(ApiError::in_body)
}

/// GET /n8n_bridge/get_state/:channel_id
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
    query: Option<Query<TokenQuery>>,
) -> std::result::Result<Json<StateResponse>, ApiError> {
    let run = async {
        let ctx = tenant_context(&headers);
        let query = query.map(|Query(q)| q).unwrap_or_default();
        let token = request_token(&headers, &state.token_header, query.token);
        let channel = RawChannelId::Text(channel_id).parse()?;

        let snapshot = state
            .commands
            .get_state(&ctx, token.as_deref(), channel)
            .await?;
        Ok::<_, BridgeError>(StateResponse::from(snapshot))
    };

    run.await.map(Json).map_err(ApiError::in_body)
}

/// POST /n8n_bridge/chat_response
pub async fn chat_response(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Json<ChatResponseRequest>, JsonRejection>,
) -> std::result::Result<Json<StatusResponse>, ApiError> {
    let run = async {
        let request = json_body(body)?;
        let ctx = tenant_context(&headers);
        let token = request_token(&headers, &state.token_header, request.token);
        let command = PostReplyCommand {
            channel_id: request.channel_id.parse()?,
            body: request.body,
            simulate_typing: request.simulate_typing,
        };

        state
            .commands
            .post_reply(&ctx, token.as_deref(), command)
            .await?;
        Ok::<_, BridgeError>(StatusResponse { status: SUCCESS })
    };

    run.await.map(Json).map_err(ApiError::with_status)
}

/// POST /n8n_bridge/set_typing
pub async fn set_typing(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Json<SetTypingRequest>, JsonRejection>,
) -> std::result::Result<Json<TypingResponse>, ApiError> {
    let run = async {
        let request = json_body(body)?;
        let ctx = tenant_context(&headers);
        let token = request_token(&headers, &state.token_header, request.token);
        let channel = request.channel_id.parse()?;

        state
            .commands
            .set_typing(&ctx, token.as_deref(), channel, request.status)
            .await?;
        Ok::<_, BridgeError>(TypingResponse {
            status: SUCCESS,
            is_typing: request.status,
        })
    };

    run.await.map(Json).map_err(ApiError::in_body)
}

/// POST /n8n_bridge/message
pub async fn ingest_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: std::result::Result<Json<MessageRequest>, JsonRejection>,
) -> std::result::Result<Json<MessageResponse>, ApiError> {
    let run = async {
        let request = json_body(body)?;
        let ctx = tenant_context(&headers);
        let token = request_token(&headers, &state.token_header, request.token);
        let message = NewMessage {
            channel_id: request.channel_id.parse()?,
            author: request.author,
            body: request.body,
        };

        let created = state
            .commands
            .ingest_message(&ctx, token.as_deref(), message)
            .await?;
        Ok::<_, BridgeError>(MessageResponse {
            status: SUCCESS,
            message_id: created.id,
        })
    };

    run.await.map(Json).map_err(ApiError::in_body)
}

/// GET /health
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
