use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use larder_types::events::GatewayEvent;

/// Routes gateway events to rooms. A room is keyed by a user id and holds
/// every live connection of that user.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// room_id -> (conn_id -> sender)
    rooms: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Joining twice is a no-op.
    pub async fn join_room(&self, room_id: Uuid, conn_id: Uuid, tx: mpsc::UnboundedSender<GatewayEvent>) {
        let mut rooms = self.inner.rooms.write().await;
        rooms.entry(room_id).or_default().entry(conn_id).or_insert(tx);
    }

    /// Drop a connection from every room it joined.
    pub async fn leave_all(&self, conn_id: Uuid) {
        let mut rooms = self.inner.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Send an event to every connection in a room. Returns how many
    /// connections it was handed to.
    pub async fn emit_to_room(&self, room_id: Uuid, event: GatewayEvent) -> usize {
        self.emit_to_rooms(&[room_id], event).await
    }

    /// Send one event to several rooms. Each connection receives it at most
    /// once, even when rooms repeat or overlap.
    pub async fn emit_to_rooms(&self, room_ids: &[Uuid], event: GatewayEvent) -> usize {
        let rooms = self.inner.rooms.read().await;
        let mut seen = HashSet::new();
        let mut delivered = 0;

        for room_id in room_ids {
            let Some(members) = rooms.get(room_id) else {
                continue;
            };
            for (conn_id, tx) in members {
                if seen.insert(*conn_id) && tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }

        debug!("Event delivered to {} connection(s) in {} room(s)", delivered, room_ids.len());
        delivered
    }

    pub async fn room_size(&self, room_id: Uuid) -> usize {
        self.inner
            .rooms
            .read()
            .await
            .get(&room_id)
            .map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_event(message: &str) -> GatewayEvent {
        GatewayEvent::Error {
            message: message.into(),
        }
    }

    async fn connect(
        dispatcher: &Dispatcher,
        room_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        dispatcher.join_room(room_id, conn_id, tx).await;
        (conn_id, rx)
    }

    #[tokio::test]
    async fn room_reaches_every_connection_of_a_user() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let (_, mut phone) = connect(&dispatcher, alice).await;
        let (_, mut laptop) = connect(&dispatcher, alice).await;
        let (_, mut other) = connect(&dispatcher, Uuid::new_v4()).await;

        assert_eq!(dispatcher.emit_to_room(alice, error_event("hi")).await, 2);
        assert_eq!(phone.try_recv().unwrap(), error_event("hi"));
        assert_eq!(laptop.try_recv().unwrap(), error_event("hi"));
        assert!(other.try_recv().is_err());
    }

    #[tokio::test]
    async fn repeated_rooms_deliver_once() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (_, mut a) = connect(&dispatcher, alice).await;
        let (_, mut b) = connect(&dispatcher, bob).await;

        let delivered = dispatcher
            .emit_to_rooms(&[alice, bob, alice], error_event("x"))
            .await;
        assert_eq!(delivered, 2);
        assert!(a.try_recv().is_ok());
        assert!(a.try_recv().is_err());
        assert!(b.try_recv().is_ok());
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn joining_twice_is_idempotent() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let conn_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatcher.join_room(alice, conn_id, tx.clone()).await;
        dispatcher.join_room(alice, conn_id, tx).await;

        assert_eq!(dispatcher.room_size(alice).await, 1);
        dispatcher.emit_to_room(alice, error_event("once")).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn leaving_cleans_up_empty_rooms() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let (conn_id, _rx) = connect(&dispatcher, alice).await;

        dispatcher.leave_all(conn_id).await;
        assert_eq!(dispatcher.room_size(alice).await, 0);
        assert_eq!(dispatcher.emit_to_room(alice, error_event("gone")).await, 0);
    }
}
