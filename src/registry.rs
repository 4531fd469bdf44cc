use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::chat::events::ServerEvent;

/// Write half of one live connection. Frames pushed here are forwarded to the
/// socket by the connection's own forward task, so a send never blocks.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: Uuid::now_v7(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a single event for this connection only.
    pub fn send_event(&self, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(frame) => self.tx.send(frame).is_ok(),
            Err(e) => {
                tracing::warn!(event = event.name(), error = %e, "failed to serialize event");
                false
            }
        }
    }
}

/// Process-wide map of room id to live subscribed connections.
///
/// One registry-wide lock guards all mutations; broadcasts snapshot the
/// subscriber set before sending so concurrent (un)subscribes cannot corrupt
/// iteration. Authorization is the caller's job: `subscribe` trusts that the
/// principal was already verified as a room participant.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<Uuid, HashMap<Uuid, ConnectionHandle>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: subscribing the same connection twice keeps one entry.
    pub async fn subscribe(&self, handle: &ConnectionHandle, room_id: Uuid) {
        let mut rooms = self.rooms.lock().await;
        rooms.entry(room_id).or_default().insert(handle.id, handle.clone());
        tracing::debug!(conn_id = %handle.id, %room_id, "subscribed");
    }

    /// No-op when the connection or room is unknown. Drops the room entry
    /// once its subscriber set empties (idle rooms leave the registry, not
    /// the database).
    pub async fn unsubscribe(&self, conn_id: Uuid, room_id: Uuid) {
        let mut rooms = self.rooms.lock().await;
        if let Some(subs) = rooms.get_mut(&room_id) {
            subs.remove(&conn_id);
            if subs.is_empty() {
                rooms.remove(&room_id);
            }
        }
        tracing::debug!(%conn_id, %room_id, "unsubscribed");
    }

    /// Bulk variant used on connection teardown.
    pub async fn unsubscribe_all(&self, conn_id: Uuid, room_ids: impl IntoIterator<Item = Uuid>) {
        let mut rooms = self.rooms.lock().await;
        for room_id in room_ids {
            if let Some(subs) = rooms.get_mut(&room_id) {
                subs.remove(&conn_id);
                if subs.is_empty() {
                    rooms.remove(&room_id);
                }
            }
        }
    }

    /// Serialize once, snapshot the subscriber set, fan out. Connections whose
    /// channel is closed are evicted as a side effect; failures never reach
    /// the caller.
    pub async fn broadcast(&self, room_id: Uuid, event: &ServerEvent, exclude: Option<Uuid>) {
        let frame = match serde_json::to_string(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(event = event.name(), error = %e, "failed to serialize event");
                return;
            }
        };

        let targets: Vec<ConnectionHandle> = {
            let rooms = self.rooms.lock().await;
            match rooms.get(&room_id) {
                Some(subs) => subs
                    .values()
                    .filter(|handle| Some(handle.id) != exclude)
                    .cloned()
                    .collect(),
                None => return,
            }
        };

        let mut dead = Vec::new();
        for handle in &targets {
            if handle.tx.send(frame.clone()).is_err() {
                dead.push(handle.id);
            }
        }
        tracing::debug!(
            event = event.name(),
            %room_id,
            recipients = targets.len() - dead.len(),
            "broadcast"
        );

        if !dead.is_empty() {
            let mut rooms = self.rooms.lock().await;
            if let Some(subs) = rooms.get_mut(&room_id) {
                for conn_id in &dead {
                    if subs.remove(conn_id).is_some() {
                        tracing::warn!(%conn_id, %room_id, "evicted dead subscriber");
                    }
                }
                if subs.is_empty() {
                    rooms.remove(&room_id);
                }
            }
        }
    }

    /// Fire-and-forget broadcast for callers outside the connection-handling
    /// domain (the REST ingestion path). Schedules onto the running runtime
    /// without waiting for delivery; with no runtime (isolated tests) it is a
    /// no-op.
    pub fn broadcast_detached(self: &Arc<Self>, room_id: Uuid, event: ServerEvent) {
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let registry = Arc::clone(self);
                rt.spawn(async move {
                    registry.broadcast(room_id, &event, None).await;
                });
            }
            Err(_) => {
                tracing::debug!(%room_id, event = event.name(), "no runtime, skipping broadcast");
            }
        }
    }

    pub async fn subscriber_count(&self, room_id: Uuid) -> usize {
        let rooms = self.rooms.lock().await;
        rooms.get(&room_id).map_or(0, HashMap::len)
    }

    pub async fn is_subscribed(&self, conn_id: Uuid, room_id: Uuid) -> bool {
        let rooms = self.rooms.lock().await;
        rooms
            .get(&room_id)
            .is_some_and(|subs| subs.contains_key(&conn_id))
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::events::TypingPayload;

    fn typing(room_id: Uuid) -> ServerEvent {
        ServerEvent::UserTyping {
            room_id,
            payload: TypingPayload {
                user_id: Uuid::now_v7(),
                typing: true,
            },
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_all_subscribers_except_excluded() {
        let registry = RoomRegistry::new();
        let room_id = Uuid::now_v7();
        let (a, mut rx_a) = ConnectionHandle::new();
        let (b, mut rx_b) = ConnectionHandle::new();
        registry.subscribe(&a, room_id).await;
        registry.subscribe(&b, room_id).await;

        registry.broadcast(room_id, &typing(room_id), Some(a.id())).await;

        assert!(rx_a.try_recv().is_err());
        let frame = rx_b.try_recv().expect("b should receive");
        assert!(frame.contains("user_typing"));
        assert!(frame.contains(&room_id.to_string()));
    }

    #[tokio::test]
    async fn double_subscribe_delivers_once() {
        let registry = RoomRegistry::new();
        let room_id = Uuid::now_v7();
        let (conn, mut rx) = ConnectionHandle::new();
        registry.subscribe(&conn, room_id).await;
        registry.subscribe(&conn, room_id).await;
        assert_eq!(registry.subscriber_count(room_id).await, 1);

        registry.broadcast(room_id, &typing(room_id), None).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_subscriber_is_evicted_without_breaking_delivery() {
        let registry = RoomRegistry::new();
        let room_id = Uuid::now_v7();
        let (alive, mut rx_alive) = ConnectionHandle::new();
        let (dead, rx_dead) = ConnectionHandle::new();
        registry.subscribe(&alive, room_id).await;
        registry.subscribe(&dead, room_id).await;
        drop(rx_dead);

        registry.broadcast(room_id, &typing(room_id), None).await;

        assert!(rx_alive.try_recv().is_ok());
        assert_eq!(registry.subscriber_count(room_id).await, 1);
        assert!(!registry.is_subscribed(dead.id(), room_id).await);
    }

    #[tokio::test]
    async fn unsubscribe_unknown_room_is_noop() {
        let registry = RoomRegistry::new();
        let (conn, _rx) = ConnectionHandle::new();
        registry.unsubscribe(conn.id(), Uuid::now_v7()).await;
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn empty_rooms_are_garbage_collected() {
        let registry = RoomRegistry::new();
        let room_id = Uuid::now_v7();
        let (conn, _rx) = ConnectionHandle::new();
        registry.subscribe(&conn, room_id).await;
        assert_eq!(registry.room_count().await, 1);

        registry.unsubscribe(conn.id(), room_id).await;
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn unsubscribe_all_clears_every_tracked_room() {
        let registry = RoomRegistry::new();
        let (conn, _rx) = ConnectionHandle::new();
        let rooms: Vec<Uuid> = (0..3).map(|_| Uuid::now_v7()).collect();
        for &room_id in &rooms {
            registry.subscribe(&conn, room_id).await;
        }

        registry.unsubscribe_all(conn.id(), rooms.iter().copied()).await;
        assert_eq!(registry.room_count().await, 0);
    }

    #[test]
    fn detached_broadcast_without_runtime_is_noop() {
        let registry = Arc::new(RoomRegistry::new());
        registry.broadcast_detached(Uuid::now_v7(), ServerEvent::error("X", "no runtime here"));
    }
}
