//! Hub actor implementation
//!
//! The central actor that owns the global client registry and the room
//! directory. All access goes through `HubCommand` messages processed one at
//! a time by `Hub::run`, so neither registry needs a lock.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::Client;
use crate::error::ChatError;
use crate::mailbox::fan_out;
use crate::message::{Message, ServerMessage};
use crate::room::{RoomActor, RoomHandle};
use crate::types::{ClientId, RoomName};

/// Commands sent from sessions to the hub actor
#[derive(Debug)]
pub enum HubCommand {
    /// New client connected
    Register { client: Client },
    /// Client disconnected or quit
    Deregister { client_id: ClientId },
    /// Client changed its display name
    Rename { client_id: ClientId, name: String },
    /// Create a new room
    CreateRoom { name: RoomName, requester: ClientId },
    /// Resolve a room name to its actor
    FindRoom {
        name: RoomName,
        respond_to: oneshot::Sender<Result<RoomHandle, ChatError>>,
    },
    /// Reply with the connected users
    ListUsers { requester: ClientId },
    /// Reply with the existing rooms
    ListRooms { requester: ClientId },
    /// Send to every registered client except the sender
    BroadcastGlobal(Message),
}

/// Handle to the hub actor
///
/// Cheap to clone; one per connection handler.
#[derive(Debug, Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
    cancel_token: CancellationToken,
}

impl HubHandle {
    /// Spawn the hub actor and return a handle to it plus its task
    ///
    /// Cancelling `cancel_token` stops the hub and every room it created.
    pub fn spawn(
        hub_capacity: usize,
        room_capacity: usize,
        cancel_token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(hub_capacity);
        let hub = Hub::new(receiver, room_capacity, cancel_token.clone());
        let task = tokio::spawn(hub.run());
        (
            Self {
                sender,
                cancel_token,
            },
            task,
        )
    }

    pub async fn register(&self, client: Client) -> Result<(), ChatError> {
        self.send(HubCommand::Register { client }).await
    }

    pub async fn deregister(&self, client_id: ClientId) -> Result<(), ChatError> {
        self.send(HubCommand::Deregister { client_id }).await
    }

    pub async fn rename(&self, client_id: ClientId, name: String) -> Result<(), ChatError> {
        self.send(HubCommand::Rename { client_id, name }).await
    }

    /// Create a room; the outcome is replied to the requester's mailbox
    pub async fn create_room(&self, name: RoomName, requester: ClientId) -> Result<(), ChatError> {
        self.send(HubCommand::CreateRoom { name, requester }).await
    }

    /// Look up a room by name
    pub async fn find_room(&self, name: RoomName) -> Result<RoomHandle, ChatError> {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::FindRoom {
            name,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| ChatError::TransportClosed)?
    }

    pub async fn list_users(&self, requester: ClientId) -> Result<(), ChatError> {
        self.send(HubCommand::ListUsers { requester }).await
    }

    pub async fn list_rooms(&self, requester: ClientId) -> Result<(), ChatError> {
        self.send(HubCommand::ListRooms { requester }).await
    }

    pub async fn broadcast(&self, msg: Message) -> Result<(), ChatError> {
        self.send(HubCommand::BroadcastGlobal(msg)).await
    }

    /// Stop the hub and all rooms
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), ChatError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| ChatError::TransportClosed)
    }
}

/// A room created by the hub
struct ManagedRoom {
    handle: RoomHandle,
    task: JoinHandle<()>,
}

/// The hub actor
///
/// Manages the client registry and room directory and processes commands
/// from connection handlers.
pub struct Hub {
    /// All registered clients: ClientId -> Client
    clients: HashMap<ClientId, Client>,
    /// All rooms: RoomName -> room actor
    rooms: HashMap<RoomName, ManagedRoom>,
    /// Mailbox capacity for new rooms
    room_capacity: usize,
    /// Command receiver channel
    receiver: mpsc::Receiver<HubCommand>,
    /// Parent of every room's token
    cancel_token: CancellationToken,
}

impl Hub {
    pub fn new(
        receiver: mpsc::Receiver<HubCommand>,
        room_capacity: usize,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            clients: HashMap::new(),
            rooms: HashMap::new(),
            room_capacity,
            receiver,
            cancel_token,
        }
    }

    /// Run the hub event loop
    ///
    /// Processes commands until cancelled or all senders are dropped, then
    /// stops every room.
    pub async fn run(mut self) {
        info!("Hub started");

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

        self.cancel_token.cancel();
        for (_, room) in self.rooms.drain() {
            let _ = room.task.await;
        }

        info!("Hub shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register { client } => self.handle_register(client),
            HubCommand::Deregister { client_id } => self.handle_deregister(client_id),
            HubCommand::Rename { client_id, name } => self.handle_rename(client_id, name),
            HubCommand::CreateRoom { name, requester } => self.handle_create_room(name, requester),
            HubCommand::FindRoom { name, respond_to } => {
                let result = self
                    .rooms
                    .get(&name)
                    .map(|room| room.handle.clone())
                    .ok_or_else(|| ChatError::NotFound(name.to_string()));
                let _ = respond_to.send(result);
            }
            HubCommand::ListUsers { requester } => self.handle_list_users(requester),
            HubCommand::ListRooms { requester } => self.handle_list_rooms(requester),
            HubCommand::BroadcastGlobal(msg) => self.send_to_all(&msg),
        }
    }

    fn handle_register(&mut self, client: Client) {
        info!("Client {} registered as '{}'", client.id, client.name);
        let notice = Message::new(
            client.id,
            ServerMessage::UserJoined {
                name: client.name.clone(),
            },
        );
        self.clients.insert(client.id, client);
        self.send_to_all(&notice);
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
    }

    fn handle_deregister(&mut self, client_id: ClientId) {
        // Disconnect before register is tolerated
        let Some(client) = self.clients.remove(&client_id) else {
            return;
        };

        info!("Client {} ('{}') deregistered", client_id, client.name);
        self.send_to_all(&Message::new(
            client_id,
            ServerMessage::UserLeft { name: client.name },
        ));
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
    }

    fn handle_rename(&mut self, client_id: ClientId, name: String) {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return;
        };

        info!("Client {} renamed '{}' -> '{}'", client_id, client.name, name);
        client.set_name(name);
    }

    fn handle_create_room(&mut self, name: RoomName, requester: ClientId) {
        let reply = if self.rooms.contains_key(&name) {
            ServerMessage::from(ChatError::AlreadyExists(name.to_string()))
        } else {
            let (handle, task) = RoomActor::spawn(
                name.clone(),
                self.room_capacity,
                self.cancel_token.child_token(),
            );
            self.rooms.insert(name.clone(), ManagedRoom { handle, task });
            info!("Client {} created room {}", requester, name);
            ServerMessage::RoomCreated { room: name }
        };

        if let Some(client) = self.clients.get(&requester) {
            client.send(reply);
        }
    }

    fn handle_list_users(&self, requester: ClientId) {
        let Some(client) = self.clients.get(&requester) else {
            return;
        };

        let names = self.clients.values().map(|c| c.name.clone()).collect();
        client.send(ServerMessage::UserList { names });
    }

    fn handle_list_rooms(&self, requester: ClientId) {
        let Some(client) = self.clients.get(&requester) else {
            return;
        };

        let mut names: Vec<String> = self.rooms.keys().map(|r| r.to_string()).collect();
        names.sort();
        client.send(ServerMessage::RoomList { names });
    }

    /// Fan out to every registered client except the sender
    fn send_to_all(&self, msg: &Message) {
        fan_out(self.clients.iter().map(|(id, c)| (id, &c.outbox)), msg);
    }
}
