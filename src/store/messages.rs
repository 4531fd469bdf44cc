use sqlx::{SqliteExecutor, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::Message;

pub async fn get_by_id(
    ex: impl SqliteExecutor<'_>,
    message_id: Uuid,
) -> sqlx::Result<Option<Message>> {
    sqlx::query_as(
        "SELECT id, room_id, user_id, content, quote_id, created_at
         FROM chat_messages WHERE id = ?",
    )
    .bind(message_id)
    .fetch_optional(ex)
    .await
}

/// Most recent message of a room, for the list-rooms preview.
pub async fn last_in_room(
    ex: impl SqliteExecutor<'_>,
    room_id: Uuid,
) -> sqlx::Result<Option<Message>> {
    sqlx::query_as(
        "SELECT id, room_id, user_id, content, quote_id, created_at
         FROM chat_messages WHERE room_id = ?
         ORDER BY created_at DESC, id DESC
         LIMIT 1",
    )
    .bind(room_id)
    .fetch_optional(ex)
    .await
}

/// Messages of a room, newest first. With a cursor the page starts strictly
/// after (older than) the cursor message and the numeric offset is ignored;
/// ids are UUIDv7 so they break created_at ties deterministically.
pub async fn list_paginated(
    ex: impl SqliteExecutor<'_>,
    room_id: Uuid,
    limit: i64,
    offset: i64,
    before: Option<&Message>,
) -> sqlx::Result<Vec<Message>> {
    if let Some(before) = before {
        sqlx::query_as(
            "SELECT id, room_id, user_id, content, quote_id, created_at
             FROM chat_messages
             WHERE room_id = ?
               AND (created_at < ? OR (created_at = ? AND id < ?))
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(room_id)
        .bind(before.created_at)
        .bind(before.created_at)
        .bind(before.id)
        .bind(limit)
        .fetch_all(ex)
        .await
    } else {
        sqlx::query_as(
            "SELECT id, room_id, user_id, content, quote_id, created_at
             FROM chat_messages
             WHERE room_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(room_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(ex)
        .await
    }
}

pub async fn count_in_room(
    ex: impl SqliteExecutor<'_>,
    room_id: Uuid,
    before: Option<&Message>,
) -> sqlx::Result<i64> {
    if let Some(before) = before {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_messages
             WHERE room_id = ?
               AND (created_at < ? OR (created_at = ? AND id < ?))",
        )
        .bind(room_id)
        .bind(before.created_at)
        .bind(before.created_at)
        .bind(before.id)
        .fetch_one(ex)
        .await
    } else {
        sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE room_id = ?")
            .bind(room_id)
            .fetch_one(ex)
            .await
    }
}

/// The message-ingestion unit of work: insert the message, stamp the room's
/// `last_message_at` and bump every other participant's unread counter, all
/// in one transaction. The timestamp is assigned here, once, and doubles as
/// the room's new activity mark.
pub async fn create_in_room(
    pool: &SqlitePool,
    room_id: Uuid,
    user_id: Uuid,
    content: &str,
    quote_id: Option<Uuid>,
) -> sqlx::Result<Message> {
    let mut tx = pool.begin().await?;
    let message = Message {
        id: Uuid::now_v7(),
        room_id,
        user_id,
        content: content.to_owned(),
        quote_id,
        created_at: OffsetDateTime::now_utc(),
    };

    sqlx::query(
        "INSERT INTO chat_messages (id, room_id, user_id, content, quote_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(message.id)
    .bind(message.room_id)
    .bind(message.user_id)
    .bind(&message.content)
    .bind(message.quote_id)
    .bind(message.created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE chat_rooms SET last_message_at = ? WHERE id = ?")
        .bind(message.created_at)
        .bind(room_id)
        .execute(&mut *tx)
        .await?;

    super::participants::increment_unread_for_others(&mut *tx, room_id, user_id).await?;

    tx.commit().await?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{participants, rooms, testing};

    #[tokio::test]
    async fn creation_updates_room_activity_and_unread_atomically() {
        let pool = testing::pool().await;
        let a = testing::seed_user(&pool, "a@example.com").await;
        let b = testing::seed_user(&pool, "b@example.com").await;
        let room = rooms::create_direct(&pool, &[a, b], None).await.unwrap();
        assert!(room.last_message_at.is_none());

        let msg = create_in_room(&pool, room.id, a, "hi", None).await.unwrap();

        let room = rooms::get_by_id(&pool, room.id).await.unwrap().unwrap();
        assert_eq!(room.last_message_at, Some(msg.created_at));

        let other = participants::get_by_room_and_user(&pool, room.id, b)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(other.unread_count, 1);
        let author = participants::get_by_room_and_user(&pool, room.id, a)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(author.unread_count, 0);
    }

    #[tokio::test]
    async fn rollback_when_the_room_is_gone() {
        let pool = testing::pool().await;
        let a = testing::seed_user(&pool, "a@example.com").await;

        // FK violation inside the transaction: nothing may stick.
        assert!(create_in_room(&pool, Uuid::now_v7(), a, "hi", None)
            .await
            .is_err());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn cursor_pages_strictly_older_messages() {
        let pool = testing::pool().await;
        let a = testing::seed_user(&pool, "a@example.com").await;
        let b = testing::seed_user(&pool, "b@example.com").await;
        let room = rooms::create_direct(&pool, &[a, b], None).await.unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            let msg = create_in_room(&pool, room.id, a, &format!("m{i}"), None)
                .await
                .unwrap();
            ids.push(msg.id);
        }

        let newest = list_paginated(&pool, room.id, 2, 0, None).await.unwrap();
        assert_eq!(
            newest.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![ids[4], ids[3]]
        );

        let cursor = get_by_id(&pool, ids[3]).await.unwrap().unwrap();
        let older = list_paginated(&pool, room.id, 10, 0, Some(&cursor))
            .await
            .unwrap();
        assert_eq!(
            older.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![ids[2], ids[1], ids[0]]
        );
        assert_eq!(
            count_in_room(&pool, room.id, Some(&cursor)).await.unwrap(),
            3
        );
        assert_eq!(count_in_room(&pool, room.id, None).await.unwrap(), 5);
    }
}
