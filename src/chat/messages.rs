use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::Principal,
    chat::events::ServerEvent,
    model::Message,
    store, AppError, AppResult, AppState,
};

const MAX_CONTENT_CHARS: usize = 10_000;

#[derive(Debug, Deserialize)]
pub(crate) struct MessageListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    before_id: Option<Uuid>,
}

#[derive(Serialize)]
pub(crate) struct MessageListResponse {
    items: Vec<Message>,
    page: i64,
    limit: i64,
    total: i64,
    total_pages: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageCreateBody {
    content: String,
    quote_id: Option<Uuid>,
}

/// Paginated history, newest first. Viewing resets the caller's unread count
/// for the room.
pub(crate) async fn list_messages(
    State(state): State<AppState>,
    principal: Principal,
    Path(room_id): Path<Uuid>,
    Query(query): Query<MessageListQuery>,
) -> AppResult<Json<MessageListResponse>> {
    let page = query.page.filter(|p| *p >= 1).unwrap_or(1);
    let limit = query.limit.filter(|l| (1..=100).contains(l)).unwrap_or(50);
    let user_id = principal.user_id;
    let db_pool = &state.db_pool;

    store::participants::get_by_room_and_user(db_pool, room_id, user_id)
        .await?
        .ok_or(AppError::NotFound("Room"))?;

    store::participants::mark_read(db_pool, room_id, user_id).await?;

    // A cursor from another room is ignored rather than leaked as an error.
    let before = match query.before_id {
        Some(before_id) => store::messages::get_by_id(db_pool, before_id)
            .await?
            .filter(|m| m.room_id == room_id),
        None => None,
    };

    let items = store::messages::list_paginated(
        db_pool,
        room_id,
        limit,
        (page - 1) * limit,
        before.as_ref(),
    )
    .await?;
    let total = store::messages::count_in_room(db_pool, room_id, before.as_ref()).await?;

    let total_pages = if total > 0 { (total + limit - 1) / limit } else { 0 };
    Ok(Json(MessageListResponse {
        items,
        page,
        limit,
        total,
        total_pages,
    }))
}

/// The ingestion path: validate, persist in one transaction, then hand the
/// committed message to the registry for fan-out.
pub(crate) async fn create_message(
    State(state): State<AppState>,
    principal: Principal,
    Path(room_id): Path<Uuid>,
    Json(body): Json<MessageCreateBody>,
) -> AppResult<Response> {
    let user_id = principal.user_id;
    let db_pool = &state.db_pool;

    store::participants::get_by_room_and_user(db_pool, room_id, user_id)
        .await?
        .ok_or(AppError::NotFound("Room"))?;
    store::rooms::get_by_id(db_pool, room_id)
        .await?
        .ok_or(AppError::NotFound("Room"))?;

    let content = body.content.trim();
    if content.is_empty() {
        return Err(AppError::validation(
            "EMPTY_CONTENT",
            "Message content cannot be empty or whitespace only.",
        ));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::validation(
            "CONTENT_TOO_LONG",
            "Message content cannot exceed 10000 characters.",
        ));
    }

    if let Some(quote_id) = body.quote_id {
        let quoted = store::messages::get_by_id(db_pool, quote_id).await?;
        if !quoted.is_some_and(|q| q.room_id == room_id) {
            return Err(AppError::validation(
                "INVALID_QUOTE",
                "Quoted message must exist and belong to this room.",
            ));
        }
    }

    let message = store::messages::create_in_room(db_pool, room_id, user_id, content, body.quote_id)
        .await
        .map_err(|e| {
            tracing::error!(%room_id, error = %e, "failed to save chat message");
            AppError::ServiceUnavailable
        })?;

    state.registry.broadcast_detached(
        room_id,
        ServerEvent::MessageCreated {
            room_id,
            payload: message.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(message)).into_response())
}
