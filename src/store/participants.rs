use serde::Serialize;
use sqlx::{FromRow, SqliteExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::Participant;

/// Projection used in room responses: the other members of a room.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ParticipantSummary {
    pub user_id: Uuid,
    pub email: String,
}

pub async fn get_by_room_and_user(
    ex: impl SqliteExecutor<'_>,
    room_id: Uuid,
    user_id: Uuid,
) -> sqlx::Result<Option<Participant>> {
    sqlx::query_as(
        "SELECT id, room_id, user_id, unread_count, notifications_enabled, joined_at
         FROM chat_participants WHERE room_id = ? AND user_id = ?",
    )
    .bind(room_id)
    .bind(user_id)
    .fetch_optional(ex)
    .await
}

pub async fn list_other_participants(
    ex: impl SqliteExecutor<'_>,
    room_id: Uuid,
    exclude_user_id: Uuid,
) -> sqlx::Result<Vec<ParticipantSummary>> {
    sqlx::query_as(
        "SELECT p.user_id, u.email
         FROM chat_participants p
         JOIN users u ON u.id = p.user_id
         WHERE p.room_id = ? AND p.user_id <> ?
         ORDER BY p.joined_at",
    )
    .bind(room_id)
    .bind(exclude_user_id)
    .fetch_all(ex)
    .await
}

pub async fn insert(
    ex: impl SqliteExecutor<'_>,
    room_id: Uuid,
    user_id: Uuid,
) -> sqlx::Result<Participant> {
    let participant = Participant {
        id: Uuid::now_v7(),
        room_id,
        user_id,
        unread_count: 0,
        notifications_enabled: true,
        joined_at: OffsetDateTime::now_utc(),
    };
    sqlx::query(
        "INSERT INTO chat_participants (id, room_id, user_id, unread_count, notifications_enabled, joined_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(participant.id)
    .bind(participant.room_id)
    .bind(participant.user_id)
    .bind(participant.unread_count)
    .bind(participant.notifications_enabled)
    .bind(participant.joined_at)
    .execute(ex)
    .await?;
    Ok(participant)
}

/// Viewing a room marks it read.
pub async fn mark_read(
    ex: impl SqliteExecutor<'_>,
    room_id: Uuid,
    user_id: Uuid,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE chat_participants SET unread_count = 0 WHERE room_id = ? AND user_id = ?")
        .bind(room_id)
        .bind(user_id)
        .execute(ex)
        .await?;
    Ok(())
}

/// Bump the unread counter for everyone in the room except the author.
pub async fn increment_unread_for_others(
    ex: impl SqliteExecutor<'_>,
    room_id: Uuid,
    exclude_user_id: Uuid,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE chat_participants SET unread_count = unread_count + 1
         WHERE room_id = ? AND user_id <> ?",
    )
    .bind(room_id)
    .bind(exclude_user_id)
    .execute(ex)
    .await?;
    Ok(())
}
