//! Chat delivery shared by the WebSocket gateway and the REST handlers.
//!
//! A message is validated, persisted, then emitted as `receiveMessage` to the
//! sender's and the recipient's rooms.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use larder_db::Database;
use larder_types::events::GatewayEvent;
use larder_types::models::ChatMessage;

use crate::Dispatcher;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message text is required")]
    EmptyText,

    #[error("Message is too long (max {MAX_MESSAGE_CHARS} characters)")]
    TooLong,

    #[error("Cannot send a message to yourself")]
    SelfMessage,

    #[error("Recipient not found")]
    UnknownRecipient,

    #[error("Message not found")]
    NotFound,

    #[error("You can only delete your own messages")]
    NotSender,

    #[error("Failed to store message")]
    Storage(#[from] anyhow::Error),
}

/// Trimmed message text, or the reason it is unacceptable.
pub fn validate_text(text: &str) -> Result<&str, ChatError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ChatError::EmptyText);
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::TooLong);
    }
    Ok(text)
}

pub async fn send_chat_message(
    db: &Arc<Database>,
    dispatcher: &Dispatcher,
    sender_id: Uuid,
    recipient_id: Uuid,
    text: &str,
) -> Result<ChatMessage, ChatError> {
    let text = validate_text(text)?;
    if sender_id == recipient_id {
        return Err(ChatError::SelfMessage);
    }

    let msg = ChatMessage {
        id: Uuid::new_v4(),
        sender_id,
        recipient_id,
        text: text.to_string(),
        timestamp: larder_db::now(),
    };

    let db = db.clone();
    let stored = msg.clone();
    let recipient_exists = tokio::task::spawn_blocking(move || -> anyhow::Result<bool> {
        if db.get_user_by_id(recipient_id)?.is_none() {
            return Ok(false);
        }
        db.insert_message(&stored)?;
        Ok(true)
    })
    .await
    .map_err(anyhow::Error::from)??;

    if !recipient_exists {
        return Err(ChatError::UnknownRecipient);
    }

    dispatcher
        .emit_to_rooms(
            &[sender_id, recipient_id],
            GatewayEvent::ReceiveMessage(msg.clone()),
        )
        .await;

    Ok(msg)
}

/// Soft-delete a message sent by `sender_id` and tell both participants.
pub async fn delete_chat_message(
    db: &Arc<Database>,
    dispatcher: &Dispatcher,
    sender_id: Uuid,
    message_id: Uuid,
) -> Result<(), ChatError> {
    let db = db.clone();
    let msg = tokio::task::spawn_blocking(move || -> anyhow::Result<Result<ChatMessage, ChatError>> {
        let Some(msg) = db.get_message(message_id)? else {
            return Ok(Err(ChatError::NotFound));
        };
        if msg.sender_id != sender_id {
            return Ok(Err(ChatError::NotSender));
        }
        db.soft_delete_message(sender_id, message_id)?;
        Ok(Ok(msg))
    })
    .await
    .map_err(anyhow::Error::from)???;

    info!("Message {} deleted by {}", msg.id, sender_id);

    dispatcher
        .emit_to_rooms(
            &[msg.sender_id, msg.recipient_id],
            GatewayEvent::MessageDeleted {
                id: msg.id,
                sender_id: msg.sender_id,
                recipient_id: msg.recipient_id,
            },
        )
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use larder_db::models::NewUser;
    use larder_types::models::Role;
    use tokio::sync::mpsc;

    use super::*;

    fn user(db: &Database, email: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(&NewUser {
            id,
            email,
            password_hash: None,
            first_name: "",
            last_name: "",
            role: Role::User,
            created_at: larder_db::now(),
        })
        .unwrap();
        id
    }

    async fn online(dispatcher: &Dispatcher, user_id: Uuid) -> mpsc::UnboundedReceiver<GatewayEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        dispatcher.join_room(user_id, Uuid::new_v4(), tx).await;
        rx
    }

    #[test]
    fn text_is_trimmed_and_bounded() {
        assert_eq!(validate_text("  hello \n").unwrap(), "hello");
        assert!(matches!(validate_text("   "), Err(ChatError::EmptyText)));
        assert!(validate_text(&"é".repeat(MAX_MESSAGE_CHARS)).is_ok());
        assert!(matches!(
            validate_text(&"a".repeat(MAX_MESSAGE_CHARS + 1)),
            Err(ChatError::TooLong)
        ));
    }

    #[tokio::test]
    async fn send_reaches_both_participants_once() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dispatcher = Dispatcher::new();
        let alice = user(&db, "alice@x.io");
        let farmer = user(&db, "farm@x.io");
        let mut alice_rx = online(&dispatcher, alice).await;
        let mut farmer_rx = online(&dispatcher, farmer).await;

        let msg = send_chat_message(&db, &dispatcher, alice, farmer, " Any kale? ")
            .await
            .unwrap();
        assert_eq!(msg.text, "Any kale?");

        for rx in [&mut alice_rx, &mut farmer_rx] {
            assert_eq!(rx.try_recv().unwrap(), GatewayEvent::ReceiveMessage(msg.clone()));
            assert!(rx.try_recv().is_err());
        }
        assert_eq!(db.conversation(farmer, alice).unwrap(), vec![msg]);
    }

    #[tokio::test]
    async fn rejected_sends_are_not_stored() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dispatcher = Dispatcher::new();
        let alice = user(&db, "alice@x.io");
        let mut alice_rx = online(&dispatcher, alice).await;

        let ghost = Uuid::new_v4();
        assert!(matches!(
            send_chat_message(&db, &dispatcher, alice, ghost, "hi").await,
            Err(ChatError::UnknownRecipient)
        ));
        assert!(matches!(
            send_chat_message(&db, &dispatcher, alice, alice, "hi").await,
            Err(ChatError::SelfMessage)
        ));
        assert!(alice_rx.try_recv().is_err());
        assert!(db.messages_for_user(alice).unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_sender_may_delete() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dispatcher = Dispatcher::new();
        let alice = user(&db, "alice@x.io");
        let farmer = user(&db, "farm@x.io");
        let msg = send_chat_message(&db, &dispatcher, alice, farmer, "oops").await.unwrap();
        let mut farmer_rx = online(&dispatcher, farmer).await;

        assert!(matches!(
            delete_chat_message(&db, &dispatcher, farmer, msg.id).await,
            Err(ChatError::NotSender)
        ));
        delete_chat_message(&db, &dispatcher, alice, msg.id).await.unwrap();

        assert_eq!(
            farmer_rx.try_recv().unwrap(),
            GatewayEvent::MessageDeleted {
                id: msg.id,
                sender_id: alice,
                recipient_id: farmer
            }
        );
        assert!(matches!(
            delete_chat_message(&db, &dispatcher, alice, msg.id).await,
            Err(ChatError::NotFound)
        ));
    }
}
