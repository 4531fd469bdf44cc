use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// A conversation. `last_message_at` is bumped inside the message-creation
/// transaction and drives the room-list ordering.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Room {
    pub id: Uuid,
    pub chat_type: String,
    pub contact_id: Option<Uuid>,
    pub topic: Option<String>,
    pub last_message_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

/// Membership of one user in one room. Unique per (room_id, user_id).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub unread_count: i64,
    pub notifications_enabled: bool,
    pub joined_at: OffsetDateTime,
}

/// One message in a room. `quote_id` is a weak same-room reference; the
/// quoted row may disappear later (ON DELETE SET NULL).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub quote_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

/// Minimal user row. Account management lives outside this service; the chat
/// core only needs identity, email and the active flag.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}
