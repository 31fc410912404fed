//! Message definitions
//!
//! `ServerMessage` is everything the core sends to a client. Each one is
//! rendered to text by its `Display` impl and written as one frame.
//! `Message` is a fan-out request: a payload plus the sender to exclude.

use std::fmt;

use crate::error::ChatError;
use crate::types::{ClientId, RoomName};

/// Server → Client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Another client registered with the hub
    UserJoined { name: String },
    /// Another client left the hub
    UserLeft { name: String },
    /// Chat line from another client
    Chat { from: String, text: String },
    /// Room member changed their nick
    NickChanged { old: String, new: String },
    /// Own nick changed successfully
    NickSet { name: String },
    /// Snapshot of connected users
    UserList { names: Vec<String> },
    /// Snapshot of existing rooms
    RoomList { names: Vec<String> },
    /// Room created successfully
    RoomCreated { room: RoomName },
    /// Joined a room
    RoomJoined { room: RoomName },
    /// Already a member of the requested room
    AlreadyInRoom { room: RoomName },
    /// Left a room
    RoomLeft { room: RoomName },
    /// Command used without its argument
    Usage { command: &'static str },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Room name already taken
    AlreadyExists,
    /// Non-existent room
    NotFound,
    /// Room-scoped command without a room
    NotInRoom,
    /// Anything not meant for the client
    Internal,
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::UserJoined { name } => write!(f, "* {} has joined the chat", name),
            ServerMessage::UserLeft { name } => write!(f, "* {} has left the chat", name),
            ServerMessage::Chat { from, text } => write!(f, "[{}]: {}", from, text),
            ServerMessage::NickChanged { old, new } => {
                write!(f, "* {} has changed their nick to {}", old, new)
            }
            ServerMessage::NickSet { name } => write!(f, "your nick is now {}", name),
            ServerMessage::UserList { names } => {
                write!(f, "Online users: ({})", names.len())?;
                for name in names {
                    write!(f, "\n-{}", name)?;
                }
                Ok(())
            }
            ServerMessage::RoomList { names } => {
                write!(f, "Rooms: ({})", names.len())?;
                for name in names {
                    write!(f, "\n-{}", name)?;
                }
                Ok(())
            }
            ServerMessage::RoomCreated { room } => {
                write!(f, "You successfully created a new Room ({})", room)
            }
            ServerMessage::RoomJoined { room } => write!(f, "You joined {}", room),
            ServerMessage::AlreadyInRoom { room } => write!(f, "You are already in {}", room),
            ServerMessage::RoomLeft { room } => write!(f, "You left {}", room),
            ServerMessage::Usage { command } => {
                let arg = if *command == "all" { "text" } else { "name" };
                write!(f, "usage: /{} <{}>", command, arg)
            }
            ServerMessage::Error { message, .. } => f.write_str(message),
        }
    }
}

/// Convert ChatError to ServerMessage for client notification
impl From<ChatError> for ServerMessage {
    fn from(err: ChatError) -> Self {
        let (code, message) = match &err {
            ChatError::AlreadyExists(room) => {
                (ErrorCode::AlreadyExists, format!("Room '{}' already exists", room))
            }
            ChatError::NotFound(room) => {
                (ErrorCode::NotFound, format!("Room '{}' not found", room))
            }
            ChatError::NotInRoom => (
                ErrorCode::NotInRoom,
                "You are not in a room. Use /join <room> first.".to_string(),
            ),
            // Transport and mailbox errors never reach the client
            _ => (ErrorCode::Internal, "Internal error".to_string()),
        };
        ServerMessage::Error { code, message }
    }
}

/// Fan-out request posted to the hub or a room
///
/// The scope (global or room) is decided by which mailbox it is posted to.
#[derive(Debug, Clone)]
pub struct Message {
    /// Excluded from delivery
    pub sender: ClientId,
    pub payload: ServerMessage,
}

impl Message {
    pub fn new(sender: ClientId, payload: ServerMessage) -> Self {
        Self { sender, payload }
    }
}
