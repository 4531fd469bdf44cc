use sqlx::{SqliteExecutor, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::model::Room;

pub async fn get_by_id(ex: impl SqliteExecutor<'_>, room_id: Uuid) -> sqlx::Result<Option<Room>> {
    sqlx::query_as(
        "SELECT id, chat_type, contact_id, topic, last_message_at, created_at
         FROM chat_rooms WHERE id = ?",
    )
    .bind(room_id)
    .fetch_optional(ex)
    .await
}

/// Direct room whose participant set is exactly {a, b}.
pub async fn find_direct_between(
    ex: impl SqliteExecutor<'_>,
    a: Uuid,
    b: Uuid,
) -> sqlx::Result<Option<Room>> {
    sqlx::query_as(
        "SELECT r.id, r.chat_type, r.contact_id, r.topic, r.last_message_at, r.created_at
         FROM chat_rooms r
         WHERE r.chat_type = 'direct'
           AND r.id IN (SELECT room_id FROM chat_participants WHERE user_id = ?)
           AND r.id IN (SELECT room_id FROM chat_participants WHERE user_id = ?)
           AND (SELECT COUNT(*) FROM chat_participants p WHERE p.room_id = r.id) = 2
         LIMIT 1",
    )
    .bind(a)
    .bind(b)
    .fetch_optional(ex)
    .await
}

/// Room the user participates in that is linked to the given contact.
pub async fn find_by_contact_for_user(
    ex: impl SqliteExecutor<'_>,
    user_id: Uuid,
    contact_id: Uuid,
) -> sqlx::Result<Option<Room>> {
    sqlx::query_as(
        "SELECT r.id, r.chat_type, r.contact_id, r.topic, r.last_message_at, r.created_at
         FROM chat_rooms r
         JOIN chat_participants p ON p.room_id = r.id
         WHERE p.user_id = ? AND r.contact_id = ?
         LIMIT 1",
    )
    .bind(user_id)
    .bind(contact_id)
    .fetch_optional(ex)
    .await
}

/// Rooms the user participates in, most recently active first. Rooms that
/// never saw a message sort after rooms with activity.
pub async fn list_for_user(
    ex: impl SqliteExecutor<'_>,
    user_id: Uuid,
    chat_type: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Room>> {
    if let Some(chat_type) = chat_type {
        sqlx::query_as(
            "SELECT r.id, r.chat_type, r.contact_id, r.topic, r.last_message_at, r.created_at
             FROM chat_rooms r
             JOIN chat_participants p ON p.room_id = r.id
             WHERE p.user_id = ? AND r.chat_type = ?
             ORDER BY r.last_message_at DESC NULLS LAST, r.created_at DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(chat_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(ex)
        .await
    } else {
        sqlx::query_as(
            "SELECT r.id, r.chat_type, r.contact_id, r.topic, r.last_message_at, r.created_at
             FROM chat_rooms r
             JOIN chat_participants p ON p.room_id = r.id
             WHERE p.user_id = ?
             ORDER BY r.last_message_at DESC NULLS LAST, r.created_at DESC
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(ex)
        .await
    }
}

pub async fn count_for_user(
    ex: impl SqliteExecutor<'_>,
    user_id: Uuid,
    chat_type: Option<&str>,
) -> sqlx::Result<i64> {
    if let Some(chat_type) = chat_type {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_rooms r
             JOIN chat_participants p ON p.room_id = r.id
             WHERE p.user_id = ? AND r.chat_type = ?",
        )
        .bind(user_id)
        .bind(chat_type)
        .fetch_one(ex)
        .await
    } else {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_rooms r
             JOIN chat_participants p ON p.room_id = r.id
             WHERE p.user_id = ?",
        )
        .bind(user_id)
        .fetch_one(ex)
        .await
    }
}

/// Atomically create a direct room plus one participant row per user.
pub async fn create_direct(
    pool: &SqlitePool,
    user_ids: &[Uuid],
    contact_id: Option<Uuid>,
) -> sqlx::Result<Room> {
    let mut tx = pool.begin().await?;
    let room = Room {
        id: Uuid::now_v7(),
        chat_type: "direct".to_owned(),
        contact_id,
        topic: None,
        last_message_at: None,
        created_at: OffsetDateTime::now_utc(),
    };
    sqlx::query(
        "INSERT INTO chat_rooms (id, chat_type, contact_id, topic, last_message_at, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(room.id)
    .bind(&room.chat_type)
    .bind(room.contact_id)
    .bind(room.topic.as_deref())
    .bind(room.last_message_at)
    .bind(room.created_at)
    .execute(&mut *tx)
    .await?;

    for &user_id in user_ids {
        super::participants::insert(&mut *tx, room.id, user_id).await?;
    }
    tx.commit().await?;
    Ok(room)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{messages, testing};

    #[tokio::test]
    async fn exact_pair_matching_for_direct_rooms() {
        let pool = testing::pool().await;
        let a = testing::seed_user(&pool, "a@example.com").await;
        let b = testing::seed_user(&pool, "b@example.com").await;
        let c = testing::seed_user(&pool, "c@example.com").await;

        // A three-way room must not count as the direct room for {a, b}.
        create_direct(&pool, &[a, b, c], None).await.unwrap();
        assert!(find_direct_between(&pool, a, b).await.unwrap().is_none());

        let pair = create_direct(&pool, &[a, b], None).await.unwrap();
        let found = find_direct_between(&pool, a, b).await.unwrap().unwrap();
        assert_eq!(found.id, pair.id);
        let found = find_direct_between(&pool, b, a).await.unwrap().unwrap();
        assert_eq!(found.id, pair.id);
    }

    #[tokio::test]
    async fn contact_linked_room_lookup() {
        let pool = testing::pool().await;
        let a = testing::seed_user(&pool, "a@example.com").await;
        let contact_id = Uuid::now_v7();

        assert!(find_by_contact_for_user(&pool, a, contact_id)
            .await
            .unwrap()
            .is_none());

        let room = create_direct(&pool, &[a], Some(contact_id)).await.unwrap();
        let found = find_by_contact_for_user(&pool, a, contact_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, room.id);
    }

    #[tokio::test]
    async fn listing_orders_by_activity_with_quiet_rooms_last() {
        let pool = testing::pool().await;
        let a = testing::seed_user(&pool, "a@example.com").await;
        let b = testing::seed_user(&pool, "b@example.com").await;
        let c = testing::seed_user(&pool, "c@example.com").await;

        let old_active = create_direct(&pool, &[a, b], None).await.unwrap();
        let quiet = create_direct(&pool, &[a, c], None).await.unwrap();
        let new_active = create_direct(&pool, &[a, b, c], None).await.unwrap();

        messages::create_in_room(&pool, old_active.id, b, "hi", None)
            .await
            .unwrap();
        messages::create_in_room(&pool, new_active.id, c, "hello", None)
            .await
            .unwrap();

        let rooms = list_for_user(&pool, a, None, 20, 0).await.unwrap();
        let ids: Vec<Uuid> = rooms.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![new_active.id, old_active.id, quiet.id]);
        assert_eq!(count_for_user(&pool, a, None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn chat_type_filter_applies() {
        let pool = testing::pool().await;
        let a = testing::seed_user(&pool, "a@example.com").await;
        let b = testing::seed_user(&pool, "b@example.com").await;
        create_direct(&pool, &[a, b], None).await.unwrap();

        assert_eq!(count_for_user(&pool, a, Some("direct")).await.unwrap(), 1);
        assert_eq!(count_for_user(&pool, a, Some("group")).await.unwrap(), 0);
        assert!(list_for_user(&pool, a, Some("group"), 20, 0)
            .await
            .unwrap()
            .is_empty());
    }
}
