//! WebSocket gateway over a real listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

use larder_api::AppStateInner;
use larder_api::auth::create_token;
use larder_api::mailer::LogMailer;
use larder_db::Database;
use larder_db::models::NewUser;
use larder_gateway::Dispatcher;
use larder_server::build_router;
use larder_types::models::Role;

const SECRET: &str = "gateway-secret";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Harness {
    addr: SocketAddr,
    db: Arc<Database>,
}

impl Harness {
    async fn start() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = Arc::new(AppStateInner {
            db: db.clone(),
            dispatcher: Dispatcher::new(),
            jwt_secret: SECRET.into(),
            cron_key: "cron".into(),
            mailer: Arc::new(LogMailer),
            vision: None,
        });
        let app = build_router(state, None).unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, db }
    }

    fn user(&self, email: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        self.db
            .create_user(&NewUser {
                id,
                email,
                password_hash: None,
                first_name: "",
                last_name: "",
                role: Role::User,
                created_at: larder_db::now(),
            })
            .unwrap();
        (id, create_token(SECRET, id, email, Role::User).unwrap())
    }

    async fn connect(&self) -> Socket {
        let (ws, _) = connect_async(format!("ws://{}/gateway", self.addr)).await.unwrap();
        ws
    }

    /// Connect and identify; returns once `ready` arrives.
    async fn identified(&self, token: &str) -> Socket {
        let mut ws = self.connect().await;
        send(&mut ws, json!({"type": "identify", "data": {"token": token}})).await;
        let ready = next_event(&mut ws).await.expect("no ready event");
        assert_eq!(ready["type"], "ready");
        ws
    }
}

async fn send(ws: &mut Socket, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Next JSON event, skipping control frames. `None` on timeout or close.
async fn next_event(ws: &mut Socket) -> Option<Value> {
    loop {
        let msg = tokio::time::timeout(Duration::from_millis(500), ws.next())
            .await
            .ok()??
            .ok()?;
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).ok(),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

#[tokio::test]
async fn identify_answers_ready_with_the_user_id() {
    let h = Harness::start().await;
    let (id, token) = h.user("ada@larder.io");

    let mut ws = h.connect().await;
    send(&mut ws, json!({"type": "identify", "data": {"token": token}})).await;
    let ready = next_event(&mut ws).await.unwrap();
    assert_eq!(ready["type"], "ready");
    assert_eq!(ready["data"]["userId"], id.to_string());
}

#[tokio::test]
async fn bad_token_is_refused() {
    let h = Harness::start().await;
    let mut ws = h.connect().await;
    send(&mut ws, json!({"type": "identify", "data": {"token": "forged"}})).await;

    let event = next_event(&mut ws).await.unwrap();
    assert_eq!(event["type"], "error");
    assert_eq!(event["data"]["message"], "Authentication failed");
}

#[tokio::test]
async fn message_reaches_every_connection_of_both_users_once() {
    let h = Harness::start().await;
    let (ada, ada_token) = h.user("ada@larder.io");
    let (bo, bo_token) = h.user("bo@larder.io");

    let mut ada_phone = h.identified(&ada_token).await;
    let mut ada_laptop = h.identified(&ada_token).await;
    let mut bo_ws = h.identified(&bo_token).await;

    // Joining your own room again must not duplicate delivery
    send(&mut ada_phone, json!({"type": "joinRoom", "data": {"roomId": ada}})).await;

    send(
        &mut ada_phone,
        json!({"type": "sendMessage", "data": {"recipientId": bo, "text": "hello"}}),
    )
    .await;

    for ws in [&mut ada_phone, &mut ada_laptop, &mut bo_ws] {
        let event = next_event(ws).await.expect("message not delivered");
        assert_eq!(event["type"], "receiveMessage");
        assert_eq!(event["data"]["senderId"], ada.to_string());
        assert_eq!(event["data"]["recipientId"], bo.to_string());
        assert_eq!(event["data"]["text"], "hello");
        assert!(next_event(ws).await.is_none(), "duplicate delivery");
    }

    let stored = h.db.conversation(bo, ada).unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn refused_commands_get_error_events() {
    let h = Harness::start().await;
    let (_, token) = h.user("ada@larder.io");
    let mut ws = h.identified(&token).await;

    send(&mut ws, json!({"type": "joinRoom", "data": {"roomId": Uuid::new_v4()}})).await;
    let event = next_event(&mut ws).await.unwrap();
    assert_eq!(event["type"], "error");
    assert_eq!(event["data"]["message"], "Cannot join another user's room");

    ws.send(Message::text("{not json")).await.unwrap();
    let event = next_event(&mut ws).await.unwrap();
    assert_eq!(event["data"]["message"], "Malformed command");

    send(
        &mut ws,
        json!({"type": "sendMessage", "data": {"recipientId": Uuid::new_v4(), "text": "anyone?"}}),
    )
    .await;
    let event = next_event(&mut ws).await.unwrap();
    assert_eq!(event["type"], "error");
}
