use std::collections::HashMap;

use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use confab_types::api::{
    AckResponse, Claims, ConversationResponse, PeersResponse, SendMessageRequest,
    SendMessageResponse,
};
use confab_types::events::GatewayEvent;
use confab_types::models::{Message, User};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Path};

/// GET /api/messages/users -- every other user, plus how many of each one's
/// messages the caller has not seen yet.
pub async fn list_peers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    // Run blocking DB reads off the async runtime
    let db = state.clone();
    let me = claims.sub.to_string();
    let (user_rows, unseen_rows) = tokio::task::spawn_blocking(move || {
        let users = db.db.list_users_except(&me)?;
        let unseen = db.db.unseen_counts(&me)?;
        Ok::<_, anyhow::Error>((users, unseen))
    })
    .await
    .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??;

    let users: Vec<User> = user_rows.into_iter().map(|row| row.into_user()).collect();

    let mut unseen_messages = HashMap::new();
    for row in unseen_rows {
        if let Ok(sender_id) = row.sender_id.parse::<Uuid>() {
            unseen_messages.insert(sender_id, row.count);
        }
    }

    Ok(Json(PeersResponse {
        success: true,
        users,
        unseen_messages,
    }))
}

/// GET /api/messages/{id} -- the whole conversation with that peer, oldest
/// first.
///
/// Deliberately side-effecting: opening a conversation is what "seen" means
/// here, so every unseen peer -> caller message is flipped before the read
/// and the returned records already carry seen = true.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let db = state.clone();
    let me = claims.sub.to_string();
    let peer = peer_id.to_string();

    let rows = tokio::task::spawn_blocking(move || {
        db.db.mark_conversation_seen(&peer, &me)?;
        db.db.conversation(&me, &peer)
    })
    .await
    .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??;

    let messages: Vec<Message> = rows.into_iter().map(|row| row.into_message()).collect();

    Ok(Json(ConversationResponse {
        success: true,
        messages,
    }))
}

/// POST /api/messages/send/{id} -- persist a message and, if the receiver
/// holds a live gateway connection, push the stored record there. Offline
/// receivers get no push and no queue; the message surfaces on their next
/// conversation fetch.
pub async fn send_message(
    State(state): State<AppState>,
    Path(receiver_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let text = req.text.filter(|t| !t.trim().is_empty());
    if text.is_none() && req.image.is_none() {
        return Err(ApiError::Validation(
            "Message must contain text or an image".into(),
        ));
    }

    let image_url = match req.image.as_deref() {
        Some(data_uri) => Some(state.assets.store_data_uri(data_uri).await?),
        None => None,
    };

    let message = Message {
        id: Uuid::new_v4(),
        sender_id: claims.sub,
        receiver_id,
        text,
        image_url,
        seen: false,
        created_at: Utc::now(),
    };

    let db = state.clone();
    let record = message.clone();
    let inserted = tokio::task::spawn_blocking(move || {
        db.db.insert_message(
            &record.id.to_string(),
            &record.sender_id.to_string(),
            &record.receiver_id.to_string(),
            record.text.as_deref(),
            record.image_url.as_deref(),
            &confab_db::format_timestamp(record.created_at),
        )
    })
    .await
    .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))?;

    if let Err(e) = inserted {
        // The sender comes from a verified token, so a constraint trip means
        // the receiver id references nobody.
        if confab_db::is_constraint_violation(&e) {
            return Err(ApiError::Validation("Receiver not found".into()));
        }
        return Err(e.into());
    }

    let delivered = state
        .presence
        .send_to_user(
            receiver_id,
            GatewayEvent::MessageCreate {
                message: message.clone(),
            },
        )
        .await;
    if !delivered {
        debug!("{} offline, message {} stored without push", receiver_id, message.id);
    }

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            success: true,
            message,
        }),
    ))
}

/// PUT /api/messages/mark/{id} -- idempotent seen flip, used by clients to
/// acknowledge a pushed message they displayed in the open conversation.
pub async fn mark_seen(
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let db = state.clone();
    let id = message_id.to_string();

    tokio::task::spawn_blocking(move || db.db.mark_message_seen(&id))
        .await
        .map_err(|e| anyhow::anyhow!("blocking task join error: {}", e))??;

    Ok(Json(AckResponse { success: true }))
}
