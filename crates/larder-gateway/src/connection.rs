use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use larder_db::Database;
use larder_types::api::Claims;
use larder_types::events::{GatewayCommand, GatewayEvent};

use crate::Dispatcher;
use crate::chat::{self, ChatError};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket may take to send `identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-session handles shared by the command handler.
struct Session {
    user_id: Uuid,
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<GatewayEvent>,
    dispatcher: Dispatcher,
    db: Arc<Database>,
}

/// Drive one WebSocket connection: identify, join the user's own room,
/// announce `ready`, then relay events and commands until either side hangs up.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let Some(user_id) = wait_for_identify(&mut receiver, &jwt_secret).await else {
        warn!("WebSocket client failed to identify, closing");
        if let Some(frame) = encode(&GatewayEvent::Error {
            message: "Authentication failed".into(),
        }) {
            let _ = sender.send(frame).await;
        }
        return;
    };

    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    dispatcher.join_room(user_id, conn_id, tx.clone()).await;
    info!("{} connected to gateway (conn {})", user_id, conn_id);

    let Some(ready) = encode(&GatewayEvent::Ready { user_id }) else {
        dispatcher.leave_all(conn_id).await;
        return;
    };
    if sender.send(ready).await.is_err() {
        dispatcher.leave_all(conn_id).await;
        return;
    }

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Room events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let Some(frame) = encode(&event) else { continue };
                    if sender.send(frame).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let session = Session {
        user_id,
        conn_id,
        tx,
        dispatcher: dispatcher.clone(),
        db,
    };

    // Client commands -> handlers
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&session, cmd).await,
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            session.user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                        session.reply_error("Malformed command");
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.leave_all(conn_id).await;
    info!("{} disconnected from gateway (conn {})", user_id, conn_id);
}

impl Session {
    fn reply_error(&self, message: &str) {
        let _ = self.tx.send(GatewayEvent::Error {
            message: message.to_string(),
        });
    }
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, jwt_secret: &str) -> Option<Uuid> {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) = serde_json::from_str::<GatewayCommand>(&text) {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some(token_data.claims.sub);
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

async fn handle_command(session: &Session, cmd: GatewayCommand) {
    match cmd {
        GatewayCommand::Identify { .. } => {
            trace!("{} sent identify twice, ignoring", session.user_id);
        }

        GatewayCommand::JoinRoom { room_id } => {
            if room_id != session.user_id {
                warn!("{} tried to join room {}", session.user_id, room_id);
                session.reply_error("Cannot join another user's room");
                return;
            }
            session
                .dispatcher
                .join_room(room_id, session.conn_id, session.tx.clone())
                .await;
            debug!("{} joined room {}", session.user_id, room_id);
        }

        GatewayCommand::SendMessage { recipient_id, text } => {
            let sent = chat::send_chat_message(
                &session.db,
                &session.dispatcher,
                session.user_id,
                recipient_id,
                &text,
            )
            .await;

            match sent {
                Ok(msg) => debug!("{} -> {}: message {}", msg.sender_id, msg.recipient_id, msg.id),
                Err(ChatError::Storage(e)) => {
                    error!("Failed to store message from {}: {:#}", session.user_id, e);
                    session.reply_error("Failed to store message");
                }
                Err(e) => {
                    warn!("{} message refused: {}", session.user_id, e);
                    session.reply_error(&e.to_string());
                }
            }
        }
    }
}

fn encode(event: &GatewayEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            error!("Failed to encode gateway event: {}", e);
            None
        }
    }
}
