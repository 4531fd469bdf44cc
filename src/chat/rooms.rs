use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::Principal,
    model::Room,
    store::{self, participants::ParticipantSummary},
    AppError, AppResult,
};

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub(crate) struct RoomListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    chat_type: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct LastMessagePreview {
    id: Uuid,
    content: String,
    user_id: Uuid,
    created_at: OffsetDateTime,
}

#[derive(Serialize)]
pub(crate) struct RoomListItem {
    id: Uuid,
    chat_type: String,
    contact_id: Option<Uuid>,
    topic: Option<String>,
    last_message_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    unread_count: i64,
    last_message_preview: Option<LastMessagePreview>,
    other_participants: Vec<ParticipantSummary>,
}

#[derive(Serialize)]
pub(crate) struct RoomListResponse {
    items: Vec<RoomListItem>,
    page: i64,
    limit: i64,
    total: i64,
    total_pages: i64,
}

#[derive(Serialize)]
pub(crate) struct RoomResponse {
    id: Uuid,
    chat_type: String,
    contact_id: Option<Uuid>,
    topic: Option<String>,
    last_message_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
    unread_count: i64,
    other_participants: Vec<ParticipantSummary>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoomCreateBody {
    other_user_id: Option<Uuid>,
    contact_id: Option<Uuid>,
}

fn preview_content(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let truncated: String = content.chars().take(PREVIEW_CHARS).collect();
        truncated + "..."
    } else {
        content.to_owned()
    }
}

pub(crate) async fn list_rooms(
    State(db_pool): State<SqlitePool>,
    principal: Principal,
    Query(query): Query<RoomListQuery>,
) -> AppResult<Json<RoomListResponse>> {
    let page = query.page.filter(|p| *p >= 1).unwrap_or(1);
    let limit = query.limit.filter(|l| (1..=100).contains(l)).unwrap_or(20);
    let chat_type = query.chat_type.as_deref();
    let user_id = principal.user_id;

    let rooms =
        store::rooms::list_for_user(&db_pool, user_id, chat_type, limit, (page - 1) * limit)
            .await?;
    let total = store::rooms::count_for_user(&db_pool, user_id, chat_type).await?;

    let mut items = Vec::with_capacity(rooms.len());
    for room in rooms {
        let participant =
            store::participants::get_by_room_and_user(&db_pool, room.id, user_id).await?;
        let last_message = store::messages::last_in_room(&db_pool, room.id).await?;
        let other_participants =
            store::participants::list_other_participants(&db_pool, room.id, user_id).await?;

        items.push(RoomListItem {
            id: room.id,
            chat_type: room.chat_type,
            contact_id: room.contact_id,
            topic: room.topic,
            last_message_at: room.last_message_at,
            created_at: room.created_at,
            unread_count: participant.map_or(0, |p| p.unread_count),
            last_message_preview: last_message.map(|m| LastMessagePreview {
                id: m.id,
                content: preview_content(&m.content),
                user_id: m.user_id,
                created_at: m.created_at,
            }),
            other_participants,
        });
    }

    let total_pages = if total > 0 { (total + limit - 1) / limit } else { 0 };
    Ok(Json(RoomListResponse {
        items,
        page,
        limit,
        total,
        total_pages,
    }))
}

async fn room_response(
    db_pool: &SqlitePool,
    room: Room,
    user_id: Uuid,
    unread_count: i64,
) -> AppResult<RoomResponse> {
    let other_participants =
        store::participants::list_other_participants(db_pool, room.id, user_id).await?;
    Ok(RoomResponse {
        id: room.id,
        chat_type: room.chat_type,
        contact_id: room.contact_id,
        topic: room.topic,
        last_message_at: room.last_message_at,
        created_at: room.created_at,
        unread_count,
        other_participants,
    })
}

/// Create-or-get a direct room, keyed either on another user or on a linked
/// contact. Finding an existing room returns it instead of duplicating.
pub(crate) async fn create_or_get_room(
    State(db_pool): State<SqlitePool>,
    principal: Principal,
    Json(body): Json<RoomCreateBody>,
) -> AppResult<Response> {
    let user_id = principal.user_id;

    if let Some(other_user_id) = body.other_user_id {
        if other_user_id == user_id {
            return Err(AppError::validation(
                "INVALID_OTHER_USER",
                "other_user_id cannot be yourself.",
            ));
        }
        if store::users::get_by_id(&db_pool, other_user_id).await?.is_none() {
            return Err(AppError::NotFound("User"));
        }

        if let Some(room) = store::rooms::find_direct_between(&db_pool, user_id, other_user_id)
            .await?
        {
            let unread = store::participants::get_by_room_and_user(&db_pool, room.id, user_id)
                .await?
                .map_or(0, |p| p.unread_count);
            let resp = room_response(&db_pool, room, user_id, unread).await?;
            return Ok((StatusCode::CREATED, Json(resp)).into_response());
        }

        let room = store::rooms::create_direct(&db_pool, &[user_id, other_user_id], None).await?;
        let resp = room_response(&db_pool, room, user_id, 0).await?;
        return Ok((StatusCode::CREATED, Json(resp)).into_response());
    }

    if let Some(contact_id) = body.contact_id {
        if let Some(room) =
            store::rooms::find_by_contact_for_user(&db_pool, user_id, contact_id).await?
        {
            let unread = store::participants::get_by_room_and_user(&db_pool, room.id, user_id)
                .await?
                .map_or(0, |p| p.unread_count);
            let resp = room_response(&db_pool, room, user_id, unread).await?;
            return Ok((StatusCode::CREATED, Json(resp)).into_response());
        }

        let room = store::rooms::create_direct(&db_pool, &[user_id], Some(contact_id)).await?;
        let resp = room_response(&db_pool, room, user_id, 0).await?;
        return Ok((StatusCode::CREATED, Json(resp)).into_response());
    }

    Err(AppError::validation(
        "MISSING_PARAM",
        "Provide other_user_id or contact_id.",
    ))
}

/// Only participants may see a room; everyone else gets the same NotFound a
/// nonexistent room would produce.
pub(crate) async fn get_room(
    State(db_pool): State<SqlitePool>,
    principal: Principal,
    Path(room_id): Path<Uuid>,
) -> AppResult<Json<RoomResponse>> {
    let user_id = principal.user_id;
    let participant = store::participants::get_by_room_and_user(&db_pool, room_id, user_id)
        .await?
        .ok_or(AppError::NotFound("Room"))?;
    let room = store::rooms::get_by_id(&db_pool, room_id)
        .await?
        .ok_or(AppError::NotFound("Room"))?;

    let resp = room_response(&db_pool, room, user_id, participant.unread_count).await?;
    Ok(Json(resp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_content_with_ellipsis() {
        let short = "hello";
        assert_eq!(preview_content(short), "hello");

        let long = "x".repeat(250);
        let preview = preview_content(&long);
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));

        let exactly = "y".repeat(200);
        assert_eq!(preview_content(&exactly), exactly);
    }
}
