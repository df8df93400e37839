use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use depot_types::api::{
    ContactResponse, EditMessageRequest, MarkReadResponse, MessageResponse, SendMessageRequest,
    UnreadSummary,
};
use depot_types::events::GatewayEvent;

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::with_db;

/// Everyone else, with unread counters, most recent conversation first.
pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let me = user.id.to_string();
    let rows = with_db(&state, move |db| db.list_contacts(&me)).await?;
    Ok(Json(convert::all(rows, convert::contact)?))
}

pub async fn unread_summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<UnreadSummary>> {
    let me = user.id.to_string();
    let count = with_db(&state, move |db| db.unread_count(&me)).await?;
    Ok(Json(UnreadSummary {
        has_unread: count > 0,
        count,
    }))
}

/// Both directions of the conversation with `other_id`, oldest first.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(other_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<MessageResponse>>> {
    let me = user.id.to_string();
    let other = other_id.to_string();
    let rows = with_db(&state, move |db| {
        if db.get_user_by_id(&other)?.is_none() {
            return Ok(None);
        }
        db.get_conversation(&me, &other).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::not_found("user not found"))?;

    Ok(Json(convert::all(rows, convert::message)?))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.recipient_id == user.id {
        return Err(ApiError::bad_request("cannot send a message to yourself"));
    }
    if req.body.trim().is_empty() && req.attachment_id.is_none() {
        return Err(ApiError::bad_request("message body is empty"));
    }

    let message_id = Uuid::new_v4().to_string();
    let sender = user.id.to_string();
    let recipient = req.recipient_id.to_string();
    let attachment = req.attachment_id.map(|id| id.to_string());
    let body = req.body;

    let row = with_db(&state, move |db| {
        if db.get_user_by_id(&recipient)?.is_none() {
            return Ok(Err(ApiError::not_found("recipient not found")));
        }
        if let Some(file_id) = attachment.as_deref() {
            let owned = db
                .get_file(file_id)?
                .is_some_and(|f| f.uploader_id == sender);
            if !owned {
                return Ok(Err(ApiError::bad_request("unknown attachment")));
            }
        }
        let row = db.insert_message(&message_id, &sender, &recipient, &body, attachment.as_deref())?;
        Ok(Ok(row))
    })
    .await??;

    let message = convert::message(row)?;

    // Persisted first; the push is best-effort
    state
        .dispatcher
        .notify_pair(
            message.recipient_id,
            message.sender_id,
            GatewayEvent::MessageCreate(message.clone()),
        )
        .await;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Only the sender sees their message here; anyone else gets 404.
pub async fn edit_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<EditMessageRequest>,
) -> ApiResult<Json<MessageResponse>> {
    // Stored as typed; only blank bodies are refused
    if req.body.trim().is_empty() {
        return Err(ApiError::bad_request("message body is empty"));
    }

    let body = req.body;
    let message_id = id.to_string();
    let sender = user.id.to_string();
    let row = with_db(&state, move |db| {
        let Some(current) = db.get_message(&message_id)?.filter(|m| m.sender_id == sender) else {
            return Ok(Err(ApiError::not_found("message not found")));
        };
        if current.body == body {
            return Ok(Err(ApiError::bad_request("message is unchanged")));
        }
        match db.edit_message(&message_id, &sender, &body)? {
            Some(row) => Ok(Ok(row)),
            None => Ok(Err(ApiError::not_found("message not found"))),
        }
    })
    .await??;

    let message = convert::message(row)?;
    state
        .dispatcher
        .notify_pair(
            message.recipient_id,
            message.sender_id,
            GatewayEvent::MessageUpdate(message.clone()),
        )
        .await;

    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    let message_id = id.to_string();
    let row = with_db(&state, move |db| db.get_message(&message_id))
        .await?
        .ok_or_else(|| ApiError::not_found("message not found"))?;

    let sender_id = convert::uuid(&row.sender_id)?;
    let recipient_id = convert::uuid(&row.recipient_id)?;
    if sender_id != user.id {
        return Err(ApiError::forbidden("you can only delete your own messages"));
    }

    let message_id = row.id;
    let deleted = with_db(&state, move |db| db.delete_message(&message_id)).await?;
    if !deleted {
        return Err(ApiError::not_found("message not found"));
    }

    info!("{} deleted message {}", user.username, id);

    state
        .dispatcher
        .notify_pair(
            recipient_id,
            sender_id,
            GatewayEvent::MessageDelete {
                id,
                sender_id,
                recipient_id,
            },
        )
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Mark everything `other_id` sent me as read.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(other_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<MarkReadResponse>> {
    let me = user.id.to_string();
    let other = other_id.to_string();
    let marked = with_db(&state, move |db| db.mark_conversation_read(&me, &other)).await?;

    if marked > 0 {
        state
            .dispatcher
            .send_to_user(
                other_id,
                GatewayEvent::MessagesRead {
                    reader_id: user.id,
                    count: marked,
                },
            )
            .await;
    }

    Ok(Json(MarkReadResponse { marked }))
}
