//! Client outbound mailboxes
//!
//! Actors write into a client's mailbox with a non-blocking attempt only:
//! a full mailbox drops the message for that recipient and the actor moves on.
//! The client's delivery task is the single consumer.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::message::{Message, ServerMessage};
use crate::types::ClientId;

/// Receiving side of an outbound mailbox, drained by the delivery task
pub type Inbox = mpsc::Receiver<ServerMessage>;

/// Producer handle to one client's outbound mailbox
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::Sender<ServerMessage>,
}

/// Create a bounded outbound mailbox
pub fn outbox(capacity: usize) -> (Outbox, Inbox) {
    let (sender, receiver) = mpsc::channel(capacity);
    (Outbox { sender }, receiver)
}

impl Outbox {
    /// Try to enqueue a message without waiting
    ///
    /// Returns `MailboxFull` if the consumer is behind and `TransportClosed`
    /// if the delivery task is gone.
    pub fn deliver(&self, msg: ServerMessage) -> Result<(), ChatError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => ChatError::MailboxFull,
            TrySendError::Closed(_) => ChatError::TransportClosed,
        })
    }

    /// Deliver, absorbing drops
    ///
    /// Used for replies and fan-out: a failed delivery is logged, never returned.
    pub fn deliver_or_drop(&self, to: ClientId, msg: ServerMessage) {
        match self.deliver(msg) {
            Ok(()) => {}
            Err(ChatError::MailboxFull) => {
                warn!(to = %to, "Outbound mailbox full, dropping message");
            }
            Err(_) => {
                debug!(to = %to, "Outbound mailbox closed, skipping");
            }
        }
    }
}

/// Fan a message out to every recipient except its sender
pub fn fan_out<'a, I>(recipients: I, msg: &Message)
where
    I: IntoIterator<Item = (&'a ClientId, &'a Outbox)>,
{
    for (id, outbox) in recipients {
        if *id == msg.sender {
            continue;
        }
        outbox.deliver_or_drop(*id, msg.payload.clone());
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn notice(text: &str) -> ServerMessage {
        ServerMessage::Chat {
            from: "test".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_deliver_full_mailbox() {
        let (outbox, mut inbox) = outbox(1);

        assert!(outbox.deliver(notice("one")).is_ok());
        assert_eq!(outbox.deliver(notice("two")), Err(ChatError::MailboxFull));

        assert_eq!(inbox.recv().await, Some(notice("one")));
        assert!(outbox.deliver(notice("three")).is_ok());
    }

    #[tokio::test]
    async fn test_deliver_closed_mailbox() {
        let (outbox, inbox) = outbox(4);
        drop(inbox);

        assert_eq!(outbox.deliver(notice("hi")), Err(ChatError::TransportClosed));
    }

    #[tokio::test]
    async fn test_fan_out_skips_sender_and_full() {
        let sender = ClientId::new();
        let slow = ClientId::new();
        let fast = ClientId::new();

        let (sender_box, mut sender_inbox) = outbox(4);
        let (slow_box, mut slow_inbox) = outbox(1);
        let (fast_box, mut fast_inbox) = outbox(4);
        slow_box.deliver(notice("backlog")).unwrap();

        let members = HashMap::from([(sender, sender_box), (slow, slow_box), (fast, fast_box)]);
        fan_out(&members, &Message::new(sender, notice("hello")));

        assert_eq!(fast_inbox.try_recv().ok(), Some(notice("hello")));
        assert_eq!(slow_inbox.try_recv().ok(), Some(notice("backlog")));
        assert!(slow_inbox.try_recv().is_err());
        assert!(sender_inbox.try_recv().is_err());
    }
}
