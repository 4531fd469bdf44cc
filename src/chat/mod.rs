pub mod events;
mod messages;
mod rooms;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/rooms",
            get(rooms::list_rooms).post(rooms::create_or_get_room),
        )
        .route("/rooms/{room_id}", get(rooms::get_room))
        .route(
            "/rooms/{room_id}/messages",
            get(messages::list_messages).post(messages::create_message),
        )
        .route("/ws", get(ws::chat_ws))
}
