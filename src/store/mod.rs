//! Persistence accessors for the chat entities. Plain async functions over a
//! `SqliteExecutor` so callers can pass the pool or an open transaction.

pub mod messages;
pub mod participants;
pub mod rooms;
pub mod users;
