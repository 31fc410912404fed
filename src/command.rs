//! Command parsing
//!
//! Turns one input line into a structured `Request` for the connection
//! handler to dispatch to the hub or the current room.

use crate::types::RoomName;

/// A parsed client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `/quit`
    Quit,
    /// `/users`
    ListUsers,
    /// `/rooms`
    ListRooms,
    /// `/create <name>`
    CreateRoom(RoomName),
    /// `/join <name>`
    JoinRoom(RoomName),
    /// `/leave`
    LeaveRoom,
    /// `/nick <name>`
    Nick(String),
    /// `/all <text>`
    Global(String),
    /// Any other non-blank line
    Say(String),
    /// Known command without its argument
    Usage(&'static str),
    /// Blank line
    Empty,
}

impl Request {
    /// Parse one line (terminator already stripped)
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return Request::Empty;
        }

        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "/quit" => Request::Quit,
            "/users" => Request::ListUsers,
            "/rooms" => Request::ListRooms,
            "/leave" => Request::LeaveRoom,
            "/create" => RoomName::parse(arg)
                .map(Request::CreateRoom)
                .unwrap_or(Request::Usage("create")),
            "/join" => RoomName::parse(arg)
                .map(Request::JoinRoom)
                .unwrap_or(Request::Usage("join")),
            "/nick" if !arg.is_empty() => Request::Nick(arg.to_string()),
            "/nick" => Request::Usage("nick"),
            "/all" if !arg.is_empty() => Request::Global(arg.to_string()),
            "/all" => Request::Usage("all"),
            _ => Request::Say(line.to_string()),
        }
    }
}
