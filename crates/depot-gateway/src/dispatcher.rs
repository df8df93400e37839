use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use depot_types::events::GatewayEvent;

/// Routes events to every live connection of a user.
///
/// Each user owns a group of connections (one per open tab or device). An
/// event sent to a user is copied into every connection's queue; users with
/// no live connection simply miss it.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// user_id -> (conn_id -> sender)
    groups: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<GatewayEvent>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the user's group. Returns (conn_id, receiver).
    pub async fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .groups
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Leave the user's group. The group is dropped with its last connection.
    pub async fn unregister(&self, user_id: Uuid, conn_id: Uuid) {
        let mut groups = self.inner.groups.write().await;
        if let Some(group) = groups.get_mut(&user_id) {
            group.remove(&conn_id);
            if group.is_empty() {
                groups.remove(&user_id);
            }
        }
    }

    /// Deliver an event to every connection of `user_id`. Connections whose
    /// receiver is gone are pruned.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let dead: Vec<Uuid> = {
            let groups = self.inner.groups.read().await;
            let Some(group) = groups.get(&user_id) else {
                return;
            };
            group
                .iter()
                .filter(|(_, tx)| tx.send(event.clone()).is_err())
                .map(|(conn_id, _)| *conn_id)
                .collect()
        };

        for conn_id in dead {
            self.unregister(user_id, conn_id).await;
        }
    }

    /// Deliver to the recipient's group and then the sender's, so every tab
    /// of both participants sees the change.
    pub async fn notify_pair(&self, recipient_id: Uuid, sender_id: Uuid, event: GatewayEvent) {
        if recipient_id != sender_id {
            self.send_to_user(recipient_id, event.clone()).await;
        }
        self.send_to_user(sender_id, event).await;
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.groups.read().await.contains_key(&user_id)
    }

    /// Live connections of one user.
    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        self.inner
            .groups
            .read()
            .await
            .get(&user_id)
            .map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_event(reader: Uuid, count: u32) -> GatewayEvent {
        GatewayEvent::MessagesRead {
            reader_id: reader,
            count,
        }
    }

    #[tokio::test]
    async fn every_connection_of_a_user_receives_the_event() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (_, mut tab1) = dispatcher.register(user).await;
        let (_, mut tab2) = dispatcher.register(user).await;

        dispatcher.send_to_user(user, read_event(user, 2)).await;

        assert_eq!(tab1.recv().await, Some(read_event(user, 2)));
        assert_eq!(tab2.recv().await, Some(read_event(user, 2)));
        assert_eq!(dispatcher.connection_count(user).await, 2);
    }

    #[tokio::test]
    async fn unregister_keeps_other_connections() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (first, _rx1) = dispatcher.register(user).await;
        let (second, mut rx2) = dispatcher.register(user).await;

        dispatcher.unregister(user, first).await;
        assert!(dispatcher.is_online(user).await);

        dispatcher.send_to_user(user, read_event(user, 1)).await;
        assert_eq!(rx2.recv().await, Some(read_event(user, 1)));

        dispatcher.unregister(user, second).await;
        assert!(!dispatcher.is_online(user).await);
        assert_eq!(dispatcher.connection_count(user).await, 0);
    }

    #[tokio::test]
    async fn notify_pair_reaches_both_sides_once() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (_, mut alice_rx) = dispatcher.register(alice).await;
        let (_, mut bob_rx) = dispatcher.register(bob).await;

        dispatcher.notify_pair(bob, alice, read_event(alice, 1)).await;

        assert_eq!(alice_rx.recv().await, Some(read_event(alice, 1)));
        assert_eq!(bob_rx.recv().await, Some(read_event(alice, 1)));
        assert!(alice_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn offline_users_are_skipped() {
        let dispatcher = Dispatcher::new();
        let nobody = Uuid::new_v4();
        dispatcher.send_to_user(nobody, read_event(nobody, 1)).await;
        assert!(!dispatcher.is_online(nobody).await);
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_block_siblings() {
        let dispatcher = Dispatcher::new();
        let user = Uuid::new_v4();
        let (_, dead) = dispatcher.register(user).await;
        let (_, mut live) = dispatcher.register(user).await;
        drop(dead);

        dispatcher.send_to_user(user, read_event(user, 5)).await;
        assert_eq!(live.recv().await, Some(read_event(user, 5)));
        assert_eq!(dispatcher.connection_count(user).await, 1);
    }
}
