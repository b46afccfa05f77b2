use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use confab_types::events::GatewayEvent;

/// Tracks which users hold a live push connection and routes events to them.
#[derive(Clone)]
pub struct PresenceTable {
    inner: Arc<PresenceInner>,
}

struct PresenceInner {
    /// Broadcast channel for presence snapshots, received by every connection
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Live connections: user_id -> (conn_id, targeted sender).
    /// A user is online exactly when they have an entry here.
    connections: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl PresenceTable {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(PresenceInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to presence snapshots. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a connection for a user. Returns (conn_id, receiver).
    ///
    /// If the user already has a connection, the new one replaces it: the old
    /// receiver's channel closes and its eventual disconnect becomes a no-op.
    /// Every connected client then receives a fresh `OnlineUsers` snapshot.
    pub async fn connect(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        // Broadcast while still holding the write lock. Snapshots carry the
        // whole online set, so receivers keep only the latest one; the lock
        // makes the send order match the table's mutation order.
        let mut connections = self.inner.connections.write().await;
        connections.insert(user_id, (conn_id, tx));
        self.broadcast(GatewayEvent::OnlineUsers {
            user_ids: snapshot(&connections),
        });
        drop(connections);

        (conn_id, rx)
    }

    /// Remove a connection, but only if conn_id still owns the entry.
    /// A stale disconnect from a replaced connection must not knock the
    /// user's newer connection offline.
    pub async fn disconnect(&self, user_id: Uuid, conn_id: Uuid) {
        let mut connections = self.inner.connections.write().await;
        match connections.get(&user_id) {
            Some((stored_conn_id, _)) if *stored_conn_id == conn_id => {
                connections.remove(&user_id);
                self.broadcast(GatewayEvent::OnlineUsers {
                    user_ids: snapshot(&connections),
                });
            }
            _ => {}
        }
    }

    /// Send a targeted event to a user's live connection.
    /// Returns false when the user is offline and the event was not queued.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) -> bool {
        let connections = self.inner.connections.read().await;
        match connections.get(&user_id) {
            Some((_, tx)) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// The ids of every currently connected user, sorted for stable output.
    pub async fn online_user_ids(&self) -> Vec<Uuid> {
        snapshot(&*self.inner.connections.read().await)
    }
}

impl Default for PresenceTable {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot(connections: &HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>) -> Vec<Uuid> {
    let mut user_ids: Vec<Uuid> = connections.keys().copied().collect();
    user_ids.sort();
    user_ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online_set(event: GatewayEvent) -> Vec<Uuid> {
        match event {
            GatewayEvent::OnlineUsers { user_ids } => user_ids,
            other => panic!("expected OnlineUsers, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connect_broadcasts_full_online_set() {
        let presence = PresenceTable::new();
        let mut rx = presence.subscribe();

        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        presence.connect(alice).await;
        assert_eq!(online_set(rx.recv().await.unwrap()), vec![alice]);

        presence.connect(bob).await;
        let mut expected = vec![alice, bob];
        expected.sort();
        assert_eq!(online_set(rx.recv().await.unwrap()), expected);
    }

    #[tokio::test]
    async fn disconnect_broadcasts_shrunk_set() {
        let presence = PresenceTable::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (alice_conn, _alice_rx) = presence.connect(alice).await;
        presence.connect(bob).await;

        let mut rx = presence.subscribe();
        presence.disconnect(alice, alice_conn).await;
        assert_eq!(online_set(rx.recv().await.unwrap()), vec![bob]);
        assert_eq!(presence.online_user_ids().await, vec![bob]);
    }

    #[tokio::test]
    async fn second_connection_replaces_first() {
        let presence = PresenceTable::new();
        let alice = Uuid::new_v4();

        let (_old_conn, mut old_rx) = presence.connect(alice).await;
        let (_new_conn, mut new_rx) = presence.connect(alice).await;

        // The replaced channel is closed, and targeted sends reach the new one
        assert!(old_rx.recv().await.is_none());

        let sent = presence
            .send_to_user(alice, GatewayEvent::OnlineUsers { user_ids: vec![] })
            .await;
        assert!(sent);
        assert!(new_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn stale_disconnect_leaves_newer_connection_online() {
        let presence = PresenceTable::new();
        let alice = Uuid::new_v4();

        let (old_conn, _old_rx) = presence.connect(alice).await;
        let (new_conn, _new_rx) = presence.connect(alice).await;

        presence.disconnect(alice, old_conn).await;
        assert_eq!(presence.online_user_ids().await, vec![alice]);

        presence.disconnect(alice, new_conn).await;
        assert!(presence.online_user_ids().await.is_empty());
    }

    #[tokio::test]
    async fn send_to_offline_user_reports_undelivered() {
        let presence = PresenceTable::new();
        let nobody = Uuid::new_v4();

        let sent = presence
            .send_to_user(nobody, GatewayEvent::OnlineUsers { user_ids: vec![] })
            .await;
        assert!(!sent);
    }

    #[tokio::test]
    async fn concurrent_connects_broadcast_snapshots_in_table_order() {
        let presence = PresenceTable::new();
        let mut rx = presence.subscribe();

        let mut users: Vec<Uuid> = (0..8).map(|_| Uuid::new_v4()).collect();
        let tasks: Vec<_> = users
            .iter()
            .map(|&user| {
                let presence = presence.clone();
                tokio::spawn(async move { presence.connect(user).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // Each snapshot is sent under the same lock that mutated the table,
        // so the stream must grow one user at a time with no stale rewinds.
        let mut last = Vec::new();
        for round in 1..=users.len() {
            last = online_set(rx.recv().await.unwrap());
            assert_eq!(last.len(), round, "snapshot {} has the wrong size", round);
        }

        users.sort();
        assert_eq!(last, users);
        assert_eq!(presence.online_user_ids().await, users);
    }
}
