//! TCP connection handler
//!
//! Handles individual client connections: line framing, request dispatch to
//! the hub and rooms, and the delivery task that drains the client's
//! outbound mailbox to the socket.

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::command::Request;
use crate::config::Config;
use crate::error::{AppError, ChatError};
use crate::hub::HubHandle;
use crate::mailbox::{outbox, Inbox, Outbox};
use crate::message::{Message, ServerMessage};
use crate::room::RoomHandle;
use crate::types::{ClientId, RoomName};

/// Handle a new TCP connection
///
/// Registers the client with the hub, runs the read loop until the peer
/// disconnects, sends `/quit`, or `shutdown` fires, then cleans up.
pub async fn handle_connection(
    stream: TcpStream,
    hub: HubHandle,
    config: &Config,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let (read_half, write_half) = stream.into_split();
    let mut lines = FramedRead::new(
        read_half,
        LinesCodec::new_with_max_length(config.max_line_length),
    );

    let client_id = ClientId::new();
    info!("Client {} connected from {}", client_id, peer_addr);

    // Server -> client mailbox and its delivery task
    let (outbox, inbox) = outbox(config.outbox_capacity);
    let delivery_token = CancellationToken::new();
    let delivery_task = tokio::spawn(deliver(
        client_id,
        inbox,
        FramedWrite::new(write_half, LinesCodec::new()),
        delivery_token.clone(),
    ));

    let mut session = Session {
        id: client_id,
        name: peer_addr,
        outbox: outbox.clone(),
        room: None,
        hub,
    };

    // Register with the hub
    if session
        .hub
        .register(Client::new(client_id, session.name.clone(), outbox))
        .await
        .is_err()
    {
        delivery_token.cancel();
        return Err(AppError::ChannelSend);
    }

    let result = loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            line = lines.next() => line,
        };

        match line {
            Some(Ok(line)) => match session.dispatch(Request::parse(&line)).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break Ok(()),
                Err(_) => break Err(AppError::ChannelSend),
            },
            Some(Err(e)) => {
                warn!("Read error from {}: {}", client_id, e);
                break end_of_input(e);
            }
            None => {
                debug!("Client {} closed the connection", client_id);
                break Ok(());
            }
        }
    };

    session.close().await;
    delivery_token.cancel();
    let _ = delivery_task.await;

    info!("Client {} disconnected", client_id);

    result
}

/// Outcome of a framing error on the read side
///
/// Over-long lines are bad client input and close the connection cleanly.
fn end_of_input(e: LinesCodecError) -> Result<(), AppError> {
    match e {
        LinesCodecError::MaxLineLengthExceeded => Ok(()),
        e => Err(AppError::from(e)),
    }
}

/// Delivery task: drain the outbound mailbox to the transport
///
/// Ends when the mailbox closes, the write fails, or `cancel` fires.
async fn deliver<W>(
    client_id: ClientId,
    mut inbox: Inbox,
    mut sink: FramedWrite<W, LinesCodec>,
    cancel: CancellationToken,
) -> Result<(), ChatError>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = inbox.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        // A peer that stops reading blocks the write; cancellation must still win
        tokio::select! {
            _ = cancel.cancelled() => break,
            res = sink.send(msg.to_string()) => {
                if let Err(e) = res {
                    debug!("Write to {} failed: {}", client_id, e);
                    return Err(ChatError::TransportClosed);
                }
            }
        }
    }

    debug!("Delivery task ended for {}", client_id);
    Ok(())
}

/// Whether the read loop keeps going after a request
enum Flow {
    Continue,
    Quit,
}

/// Per-connection state owned by the read loop
struct Session {
    id: ClientId,
    name: String,
    /// Own mailbox, for replies produced by the session itself
    outbox: Outbox,
    /// Current room, at most one
    room: Option<RoomHandle>,
    hub: HubHandle,
}

impl Session {
    /// Dispatch one request
    ///
    /// Returns an error only when the hub is gone.
    async fn dispatch(&mut self, request: Request) -> Result<Flow, ChatError> {
        match request {
            Request::Empty => {}
            Request::Quit => return Ok(Flow::Quit),
            Request::ListUsers => self.hub.list_users(self.id).await?,
            Request::ListRooms => self.hub.list_rooms(self.id).await?,
            Request::CreateRoom(name) => self.hub.create_room(name, self.id).await?,
            Request::JoinRoom(name) => self.join(name).await?,
            Request::LeaveRoom => match self.leave().await {
                Some(room) => self.reply(ServerMessage::RoomLeft { room }),
                None => self.reply(ChatError::NotInRoom.into()),
            },
            Request::Nick(name) => self.nick(name).await?,
            Request::Global(text) => {
                let msg = self.chat(text);
                self.hub.broadcast(msg).await?;
            }
            Request::Say(text) => self.say(text).await,
            Request::Usage(command) => self.reply(ServerMessage::Usage { command }),
        }
        Ok(Flow::Continue)
    }

    async fn join(&mut self, name: RoomName) -> Result<(), ChatError> {
        if let Some(room) = &self.room {
            if room.name() == &name {
                self.reply(ServerMessage::AlreadyInRoom { room: name });
                return Ok(());
            }
        }

        let room = match self.hub.find_room(name).await {
            Ok(room) => room,
            Err(e @ ChatError::NotFound(_)) => {
                self.reply(e.into());
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // At most one room at a time
        self.leave().await;

        match room.join(self.id, self.outbox.clone()).await {
            Ok(()) => {
                debug!("Client {} joined room {}", self.id, room.name());
                self.room = Some(room);
            }
            Err(e) => self.reply(e.into()),
        }
        Ok(())
    }

    /// Leave the current room, returning its name
    async fn leave(&mut self) -> Option<RoomName> {
        let room = self.room.take()?;
        // A stopped room has no members left to leave
        let _ = room.leave(self.id).await;
        Some(room.name().clone())
    }

    async fn nick(&mut self, name: String) -> Result<(), ChatError> {
        let old = std::mem::replace(&mut self.name, name.clone());
        self.hub.rename(self.id, name.clone()).await?;
        self.reply(ServerMessage::NickSet { name: name.clone() });

        if let Some(room) = &self.room {
            let notice = Message::new(self.id, ServerMessage::NickChanged { old, new: name });
            if room.broadcast(notice).await.is_err() {
                self.room = None;
            }
        }
        Ok(())
    }

    async fn say(&mut self, text: String) {
        let Some(room) = &self.room else {
            self.reply(ChatError::NotInRoom.into());
            return;
        };

        let msg = self.chat(text);
        if let Err(e) = room.broadcast(msg).await {
            self.room = None;
            self.reply(e.into());
        }
    }

    fn chat(&self, text: String) -> Message {
        Message::new(
            self.id,
            ServerMessage::Chat {
                from: self.name.clone(),
                text,
            },
        )
    }

    fn reply(&self, msg: ServerMessage) {
        self.outbox.deliver_or_drop(self.id, msg);
    }

    /// Leave the current room and deregister from the hub
    async fn close(&mut self) {
        self.leave().await;
        let _ = self.hub.deregister(self.id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn test_deliver_writes_lines_until_closed() {
        let (client, server) = tokio::io::duplex(1024);
        let (tx, rx) = outbox(8);

        tx.deliver(ServerMessage::NickSet {
            name: "Alice".to_string(),
        })
        .unwrap();
        tx.deliver(ServerMessage::UserList {
            names: vec!["Alice".to_string()],
        })
        .unwrap();
        drop(tx);

        let result = deliver(
            ClientId::new(),
            rx,
            FramedWrite::new(server, LinesCodec::new()),
            CancellationToken::new(),
        )
        .await;
        assert!(result.is_ok());

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "your nick is now Alice");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "Online users: (1)");
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "-Alice");
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deliver_stops_on_cancel() {
        let (_client, server) = tokio::io::duplex(64);
        let (_tx, rx) = outbox(8);
        let token = CancellationToken::new();
        token.cancel();

        let result = deliver(
            ClientId::new(),
            rx,
            FramedWrite::new(server, LinesCodec::new()),
            token,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_deliver_cancel_while_peer_not_reading() {
        // Tiny pipe the peer never drains, so the write blocks
        let (_client, server) = tokio::io::duplex(8);
        let (tx, rx) = outbox(8);
        tx.deliver(ServerMessage::NickSet {
            name: "x".repeat(1024),
        })
        .unwrap();
        let token = CancellationToken::new();

        let task = tokio::spawn(deliver(
            ClientId::new(),
            rx,
            FramedWrite::new(server, LinesCodec::new()),
            token.clone(),
        ));
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .expect("delivery task ignored cancellation while blocked on write")
            .unwrap();
        assert!(result.is_ok());
    }

    #[test]
    fn test_over_long_line_closes_cleanly() {
        assert!(end_of_input(LinesCodecError::MaxLineLengthExceeded).is_ok());

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(
            end_of_input(LinesCodecError::Io(io)),
            Err(AppError::Codec(_))
        ));
    }

    #[tokio::test]
    async fn test_deliver_reports_closed_transport() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let (tx, rx) = outbox(8);
        tx.deliver(ServerMessage::NickSet {
            name: "Alice".to_string(),
        })
        .unwrap();

        let result = deliver(
            ClientId::new(),
            rx,
            FramedWrite::new(server, LinesCodec::new()),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(result, Err(ChatError::TransportClosed));
    }
}
