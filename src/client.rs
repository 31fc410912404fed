//! Client struct definition
//!
//! Represents a connected client as the hub sees it.

use crate::mailbox::Outbox;
use crate::message::ServerMessage;
use crate::types::ClientId;

/// Connected client information
///
/// Holds the client's unique ID, current display name, and the outbound
/// mailbox used to reach its delivery task.
#[derive(Debug, Clone)]
pub struct Client {
    /// Unique identifier for this client
    pub id: ClientId,
    /// Display name (peer address until changed with /nick)
    pub name: String,
    /// Server → Client mailbox
    pub outbox: Outbox,
}

impl Client {
    /// Create a new client with the given ID, name and outbox
    pub fn new(id: ClientId, name: impl Into<String>, outbox: Outbox) -> Self {
        Self {
            id,
            name: name.into(),
            outbox,
        }
    }

    /// Send a message to this client without waiting
    ///
    /// Drops the message if the client's mailbox is full.
    pub fn send(&self, msg: ServerMessage) {
        self.outbox.deliver_or_drop(self.id, msg);
    }

    /// Set the client's display name
    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::outbox;

    #[tokio::test]
    async fn test_client_creation() {
        let (tx, _rx) = outbox(32);
        let client = Client::new(ClientId::new(), "127.0.0.1:5000", tx);

        assert_eq!(client.name, "127.0.0.1:5000");
    }

    #[tokio::test]
    async fn test_client_rename() {
        let (tx, _rx) = outbox(32);
        let mut client = Client::new(ClientId::new(), "127.0.0.1:5000", tx);

        client.set_name("Alice".to_string());

        assert_eq!(client.name, "Alice");
    }

    #[tokio::test]
    async fn test_client_send_drops_when_full() {
        let (tx, mut rx) = outbox(1);
        let client = Client::new(ClientId::new(), "Alice", tx);

        client.send(ServerMessage::NickSet {
            name: "one".to_string(),
        });
        client.send(ServerMessage::NickSet {
            name: "two".to_string(),
        });

        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::NickSet {
                name: "one".to_string()
            })
        );
        assert!(rx.try_recv().is_err());
    }
}
