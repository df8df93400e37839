use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{MessageResponse, NotificationResponse};

/// Events pushed over the WebSocket gateway to a user's connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms the connection is live
    Ready { user_id: Uuid, username: String },

    /// A chat message was sent; delivered to recipient and sender
    MessageCreate(MessageResponse),

    /// A chat message body was edited
    MessageUpdate(MessageResponse),

    /// A chat message was deleted by its sender
    MessageDelete {
        id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
    },

    /// The other party read `count` messages in the conversation
    MessagesRead { reader_id: Uuid, count: u32 },

    /// The other party is typing
    TypingStart { user_id: Uuid, username: String },

    /// A notification was created for this user
    NotificationCreate(NotificationResponse),
}

impl GatewayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "Ready",
            Self::MessageCreate(_) => "MessageCreate",
            Self::MessageUpdate(_) => "MessageUpdate",
            Self::MessageDelete { .. } => "MessageDelete",
            Self::MessagesRead { .. } => "MessagesRead",
            Self::TypingStart { .. } => "TypingStart",
            Self::NotificationCreate(_) => "NotificationCreate",
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Tell `recipient_id` that this user is typing
    StartTyping { recipient_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_with_type_and_data() {
        let id = Uuid::new_v4();
        let event = GatewayEvent::MessagesRead {
            reader_id: id,
            count: 3,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "MessagesRead");
        assert_eq!(value["data"]["count"], 3);
        assert_eq!(value["data"]["reader_id"], id.to_string());
    }

    #[test]
    fn start_typing_command_parses() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"StartTyping","data":{{"recipient_id":"{id}"}}}}"#);
        let GatewayCommand::StartTyping { recipient_id } =
            serde_json::from_str::<GatewayCommand>(&raw).unwrap();
        assert_eq!(recipient_id, id);
    }
}
