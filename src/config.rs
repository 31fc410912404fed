//! Server configuration
//!
//! Configuration is loaded from environment variables with defaults for
//! every setting

use std::collections::HashMap;
use std::env;

use thiserror::Error;

/// Default listening address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3000";

/// Default per-client outbound mailbox capacity
pub const DEFAULT_OUTBOX_CAPACITY: usize = 32;

/// Default hub mailbox capacity
pub const DEFAULT_HUB_MAILBOX_CAPACITY: usize = 256;

/// Default room mailbox capacity
pub const DEFAULT_ROOM_MAILBOX_CAPACITY: usize = 256;

/// Default maximum accepted line length in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Chat server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listening address (default: "127.0.0.1:3000")
    pub bind_address: String,

    /// Messages queued per client before deliveries are dropped
    pub outbox_capacity: usize,

    /// Hub mailbox capacity; sessions wait when it is full
    pub hub_mailbox_capacity: usize,

    /// Mailbox capacity of each room actor
    pub room_mailbox_capacity: usize,

    /// Longer input lines close the connection
    pub max_line_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            hub_mailbox_capacity: DEFAULT_HUB_MAILBOX_CAPACITY,
            room_mailbox_capacity: DEFAULT_ROOM_MAILBOX_CAPACITY,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("CHAT_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        Ok(Config {
            bind_address,
            outbox_capacity: parse_capacity(vars, "CHAT_OUTBOX_CAPACITY", DEFAULT_OUTBOX_CAPACITY)?,
            hub_mailbox_capacity: parse_capacity(
                vars,
                "CHAT_HUB_MAILBOX_CAPACITY",
                DEFAULT_HUB_MAILBOX_CAPACITY,
            )?,
            room_mailbox_capacity: parse_capacity(
                vars,
                "CHAT_ROOM_MAILBOX_CAPACITY",
                DEFAULT_ROOM_MAILBOX_CAPACITY,
            )?,
            max_line_length: parse_capacity(vars, "CHAT_MAX_LINE_LENGTH", DEFAULT_MAX_LINE_LENGTH)?,
        })
    }
}

/// Parse a positive size; zero would make an mpsc channel panic
fn parse_capacity(
    vars: &HashMap<String, String>,
    key: &str,
    default: usize,
) -> Result<usize, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<usize>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidValue(format!("{key}={raw}"))),
        },
    }
}
