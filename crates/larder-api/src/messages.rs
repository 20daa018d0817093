use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use larder_gateway::chat;
use larder_types::api::{
    ClearChatResponse, Claims, ConversationSummary, SendMessageRequest, StatusMessage,
};
use larder_types::models::ChatMessage;

use crate::error::{ApiError, blocking, parse_id};
use crate::extract::AppJson;
use crate::state::AppState;

/// Collapse a user's messages into one entry per counterpart, keeping the
/// newest message as the preview. Entries come out newest first.
pub fn fold_conversations(
    user_id: Uuid,
    mut messages: Vec<ChatMessage>,
    names: &HashMap<Uuid, String>,
) -> Vec<ConversationSummary> {
    messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for msg in messages {
        let partner_id = msg.counterpart(user_id);
        if !seen.insert(partner_id) {
            continue;
        }
        out.push(ConversationSummary {
            partner_id,
            partner_name: names
                .get(&partner_id)
                .cloned()
                .unwrap_or_else(|| "Unknown user".into()),
            read: msg.sender_id == user_id,
            last_message: msg.text,
            timestamp: msg.timestamp,
        });
    }
    out
}

/// `POST /messages`: same delivery path as the socket `sendMessage` command.
pub async fn send(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    AppJson(req): AppJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let msg = chat::send_chat_message(&state.db, &state.dispatcher, claims.sub, req.recipient_id, &req.text).await?;
    Ok((StatusCode::CREATED, Json(msg)))
}

/// `GET /messages/{partnerId}`, oldest first.
pub async fn conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(partner_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let partner_id = parse_id(&partner_id)?;
    let db = state.db.clone();
    let messages = blocking(move || db.conversation(claims.sub, partner_id)).await?;
    Ok(Json(messages))
}

/// `GET /messages/conversations`
pub async fn conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;

    let (messages, names) = blocking(move || {
        let messages = db.messages_for_user(user_id)?;
        let partners: Vec<Uuid> = messages
            .iter()
            .map(|m| m.counterpart(user_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let names: HashMap<Uuid, String> = db
            .get_users_by_ids(&partners)?
            .into_iter()
            .map(|row| {
                let user = row.into_user();
                (user.id, user.display_name())
            })
            .collect();
        Ok((messages, names))
    })
    .await?;

    Ok(Json(fold_conversations(user_id, messages, &names)))
}

/// `DELETE /messages/{id}`: soft delete, sender only.
pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    let id = parse_id(&id)?;
    chat::delete_chat_message(&state.db, &state.dispatcher, claims.sub, id).await?;
    Ok(Json(StatusMessage::new("Message deleted")))
}

/// `DELETE /messages/clear/{partnerId}`
pub async fn clear(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(partner_id): Path<String>,
) -> Result<Json<ClearChatResponse>, ApiError> {
    let partner_id = parse_id(&partner_id)?;
    let db = state.db.clone();
    let cleared = blocking(move || db.clear_conversation(claims.sub, partner_id)).await?;
    Ok(Json(ClearChatResponse {
        message: "Chat cleared".into(),
        cleared,
    }))
}
