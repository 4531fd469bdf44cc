use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::model::User;

pub async fn get_by_id(ex: impl SqliteExecutor<'_>, user_id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as(
        "SELECT id, email, display_name, is_active, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(ex)
    .await
}

/// Account provisioning is an external concern; this exists for seeding and
/// for the few flows that must materialize a user row locally.
pub async fn insert(ex: impl SqliteExecutor<'_>, user: &User) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO users (id, email, display_name, is_active, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(user.display_name.as_deref())
    .bind(user.is_active)
    .bind(user.created_at)
    .execute(ex)
    .await?;
    Ok(())
}
