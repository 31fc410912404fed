//! Error types for the chat server
//!
//! Defines domain errors reported back to clients and connection-level
//! errors that end a session. Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Domain errors produced by the hub, rooms and sessions
///
/// `AlreadyExists`, `NotFound` and `NotInRoom` are replied to the requesting
/// client only. `MailboxFull` never leaves the fan-out path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Room name collision on create
    #[error("Room already exists: {0}")]
    AlreadyExists(String),

    /// Join or lookup of an unknown room
    #[error("Room not found: {0}")]
    NotFound(String),

    /// Room-scoped command with no current room
    #[error("Not in room")]
    NotInRoom,

    /// Peer or actor mailbox is gone
    #[error("Transport closed")]
    TransportClosed,

    /// Recipient's outbound mailbox is full, message dropped
    #[error("Mailbox full")]
    MailboxFull,
}

/// Connection-level errors
///
/// Any of these terminates the connection handler.
#[derive(Debug, Error)]
pub enum AppError {
    /// Line framing error (over-long line, invalid UTF-8 or IO underneath)
    #[error("Line codec error: {0}")]
    Codec(#[from] tokio_util::codec::LinesCodecError),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - hub mailbox closed)
    #[error("Channel send error")]
    ChannelSend,
}
