use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, Notification};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GatewayEvent {
    /// Server confirms authentication; the connection is now in its own room.
    Ready { user_id: Uuid },

    /// A chat message was stored; sent to the sender's and recipient's rooms.
    ReceiveMessage(ChatMessage),

    /// A chat message was soft-deleted by its sender.
    MessageDeleted {
        id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
    },

    /// The expiry scan created a notification for this user.
    Notification(Notification),

    /// A command was refused.
    Error { message: String },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Join a room. Only the caller's own room (its user id) is allowed.
    JoinRoom { room_id: Uuid },

    /// Persist a chat message and route it to both participants.
    SendMessage { recipient_id: Uuid, text: String },
}
