//! Room actor implementation
//!
//! Each room runs its own loop that owns the member set and fans out room
//! messages. Traffic in one room never waits on another room or on the hub.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ChatError;
use crate::mailbox::{fan_out, Outbox};
use crate::message::{Message, ServerMessage};
use crate::types::{ClientId, RoomName};

/// Commands accepted by a room actor
#[derive(Debug)]
pub enum RoomCommand {
    /// Add a client to the member set
    Join { client_id: ClientId, outbox: Outbox },
    /// Remove a client from the member set
    Leave { client_id: ClientId },
    /// Fan a message out to all members except the sender
    Broadcast(Message),
    /// Report the current member count (test support and diagnostics)
    MemberCount { respond_to: oneshot::Sender<usize> },
}

/// Address of a room actor
///
/// Cloned into sessions as their current-room reference. Holding a handle
/// does not keep the room loop running; the loop stops when its
/// cancellation token fires.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    name: RoomName,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn name(&self) -> &RoomName {
        &self.name
    }

    /// Join this room
    pub async fn join(&self, client_id: ClientId, outbox: Outbox) -> Result<(), ChatError> {
        self.send(RoomCommand::Join { client_id, outbox }).await
    }

    /// Leave this room (no-op if not a member)
    pub async fn leave(&self, client_id: ClientId) -> Result<(), ChatError> {
        self.send(RoomCommand::Leave { client_id }).await
    }

    /// Broadcast to every member except `msg.sender`
    pub async fn broadcast(&self, msg: Message) -> Result<(), ChatError> {
        self.send(RoomCommand::Broadcast(msg)).await
    }

    /// Number of current members
    ///
    /// Test support: lets callers outside the loop observe membership
    /// after a join or leave has been processed.
    pub async fn member_count(&self) -> Result<usize, ChatError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomCommand::MemberCount { respond_to: tx }).await?;
        rx.await
            .map_err(|_| ChatError::NotFound(self.name.to_string()))
    }

    async fn send(&self, cmd: RoomCommand) -> Result<(), ChatError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| ChatError::NotFound(self.name.to_string()))
    }
}

/// Room actor
///
/// Sole owner and mutator of the room's member set.
pub struct RoomActor {
    name: RoomName,
    /// Member registry: ClientId -> outbound mailbox
    members: HashMap<ClientId, Outbox>,
    receiver: mpsc::Receiver<RoomCommand>,
    cancel_token: CancellationToken,
}

impl RoomActor {
    /// Spawn a room actor and return its handle and task
    pub fn spawn(
        name: RoomName,
        capacity: usize,
        cancel_token: CancellationToken,
    ) -> (RoomHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let actor = RoomActor {
            name: name.clone(),
            members: HashMap::new(),
            receiver,
            cancel_token,
        };
        let task = tokio::spawn(actor.run());
        (RoomHandle { name, sender }, task)
    }

    /// Run the room event loop until cancelled or every handle is dropped
    pub async fn run(mut self) {
        info!("Room {} started", self.name);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => break,
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
            }
        }

        info!("Room {} shutting down", self.name);
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join { client_id, outbox } => self.handle_join(client_id, outbox),
            RoomCommand::Leave { client_id } => self.handle_leave(client_id),
            RoomCommand::Broadcast(msg) => fan_out(&self.members, &msg),
            RoomCommand::MemberCount { respond_to } => {
                let _ = respond_to.send(self.members.len());
            }
        }
    }

    fn handle_join(&mut self, client_id: ClientId, outbox: Outbox) {
        outbox.deliver_or_drop(
            client_id,
            ServerMessage::RoomJoined {
                room: self.name.clone(),
            },
        );
        self.members.insert(client_id, outbox);
        debug!("Room {} members: {}", self.name, self.members.len());
    }

    fn handle_leave(&mut self, client_id: ClientId) {
        if self.members.remove(&client_id).is_some() {
            debug!("Room {} members: {}", self.name, self.members.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{outbox, Inbox};

    fn chat(text: &str) -> ServerMessage {
        ServerMessage::Chat {
            from: "a".to_string(),
            text: text.to_string(),
        }
    }

    fn spawn_room(name: &str) -> (RoomHandle, CancellationToken) {
        let token = CancellationToken::new();
        let (handle, _task) = RoomActor::spawn(RoomName::parse(name).unwrap(), 16, token.clone());
        (handle, token)
    }

    async fn join(room: &RoomHandle, capacity: usize) -> (ClientId, Inbox) {
        let id = ClientId::new();
        let (tx, mut rx) = outbox(capacity);
        room.join(id, tx).await.unwrap();
        // Wait for the join confirmation so the member is in place
        assert!(matches!(rx.recv().await, Some(ServerMessage::RoomJoined { .. })));
        (id, rx)
    }

    #[tokio::test]
    async fn test_room_join_and_leave() {
        let (room, _token) = spawn_room("lobby");
        let (a, _rx_a) = join(&room, 8).await;
        let (_b, _rx_b) = join(&room, 8).await;

        assert_eq!(room.member_count().await.unwrap(), 2);

        room.leave(a).await.unwrap();
        assert_eq!(room.member_count().await.unwrap(), 1);

        // Leaving twice is a no-op
        room.leave(a).await.unwrap();
        assert_eq!(room.member_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_room_broadcast_excludes_sender() {
        let (room, _token) = spawn_room("lobby");
        let (a, mut rx_a) = join(&room, 8).await;
        let (_b, mut rx_b) = join(&room, 8).await;

        room.broadcast(Message::new(a, chat("hello"))).await.unwrap();
        room.member_count().await.unwrap();

        assert_eq!(rx_b.try_recv().ok(), Some(chat("hello")));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_room_preserves_order() {
        let (room, _token) = spawn_room("lobby");
        let (a, _rx_a) = join(&room, 64).await;
        let (_b, mut rx_b) = join(&room, 64).await;

        for i in 0..20 {
            room.broadcast(Message::new(a, chat(&i.to_string())))
                .await
                .unwrap();
        }

        for i in 0..20 {
            assert_eq!(rx_b.recv().await, Some(chat(&i.to_string())));
        }
    }

    #[tokio::test]
    async fn test_room_slow_member_does_not_block() {
        let (room, _token) = spawn_room("lobby");
        let (sender, _rx_s) = join(&room, 8).await;
        let (_slow, _rx_slow) = join(&room, 1).await;
        let (_fast, mut rx_fast) = join(&room, 8).await;

        // The slow member's single slot fills on the first broadcast and
        // nobody ever drains it.
        room.broadcast(Message::new(sender, chat("one"))).await.unwrap();
        room.broadcast(Message::new(sender, chat("two"))).await.unwrap();
        room.broadcast(Message::new(sender, chat("three"))).await.unwrap();

        let count = tokio::time::timeout(std::time::Duration::from_secs(1), room.member_count())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(count, 3);

        assert_eq!(rx_fast.recv().await, Some(chat("one")));
        assert_eq!(rx_fast.recv().await, Some(chat("two")));
        assert_eq!(rx_fast.recv().await, Some(chat("three")));
    }

    #[tokio::test]
    async fn test_room_rejoin_is_idempotent() {
        let (room, _token) = spawn_room("lobby");
        let id = ClientId::new();
        let (tx, _rx) = outbox(8);

        room.join(id, tx.clone()).await.unwrap();
        room.join(id, tx).await.unwrap();

        assert_eq!(room.member_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_room_stops_on_cancel() {
        let token = CancellationToken::new();
        let (room, task) = RoomActor::spawn(RoomName::parse("lobby").unwrap(), 4, token.clone());

        token.cancel();
        task.await.unwrap();

        assert_eq!(
            room.member_count().await,
            Err(ChatError::NotFound("lobby".to_string()))
        );
    }
}
