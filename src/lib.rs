//! Line-oriented TCP Chat Server Library
//!
//! Clients connect over TCP, join named rooms and exchange text lines that
//! are fanned out to the other members.
//!
//! # Features
//! - Global join/leave notices
//! - Room creation (duplicate names rejected) and joining
//! - Room-scoped chat and global `/all` broadcast
//! - Nick changes, user and room listings
//! - Slow readers never stall anyone else
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Hub` owns the client registry and the room directory
//! - Each room is its own `RoomActor` owning its member set
//! - Each connection has a read loop forwarding requests to the hub or its
//!   room, and a delivery task draining the client's outbound mailbox
//! - No locks needed - every registry has exactly one owning task
//! - Actors write to client mailboxes with `try_send` and drop on full
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//! use chat_hub::{serve, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(&config.bind_address).await.unwrap();
//!     serve(listener, Arc::new(config), CancellationToken::new()).await;
//! }
//! ```

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod mailbox;
pub mod message;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::Client;
pub use command::Request;
pub use config::{Config, ConfigError};
pub use error::{AppError, ChatError};
pub use handler::handle_connection;
pub use hub::{Hub, HubCommand, HubHandle};
pub use mailbox::{outbox, Inbox, Outbox};
pub use message::{ErrorCode, Message, ServerMessage};
pub use room::{RoomActor, RoomCommand, RoomHandle};
pub use server::serve;
pub use types::{ClientId, RoomName};
