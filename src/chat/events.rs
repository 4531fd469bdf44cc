use serde::Serialize;
use uuid::Uuid;

use crate::model::Message;

/// Outbound frames pushed over a live connection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    MessageCreated { room_id: Uuid, payload: Message },
    UserTyping { room_id: Uuid, payload: TypingPayload },
    Error { code: &'static str, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TypingPayload {
    pub user_id: Uuid,
    pub typing: bool,
}

impl ServerEvent {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageCreated { .. } => "message_created",
            Self::UserTyping { .. } => "user_typing",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_their_tag_on_the_wire() {
        let event = ServerEvent::UserTyping {
            room_id: Uuid::now_v7(),
            payload: TypingPayload {
                user_id: Uuid::now_v7(),
                typing: true,
            },
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["event"], "user_typing");
        assert_eq!(json["payload"]["typing"], true);

        let err = ServerEvent::error("UNKNOWN_ACTION", "nope");
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&err).unwrap()).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["code"], "UNKNOWN_ACTION");
    }
}
