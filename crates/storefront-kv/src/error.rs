//! Error types for key-value store operations.

use deadpool_redis::redis::RedisError;

/// Errors that can occur while talking to the key-value store.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// No connection could be checked out of the pool.
    #[error("Redis pool error: {0}")]
    Pool(String),

    /// The server rejected or failed a command.
    #[error("Redis command error: {0}")]
    Redis(#[from] RedisError),

    /// The key holds a value of a different type than the command expects.
    #[error("Wrong value type at key {key}")]
    WrongType { key: String },

    /// The value at a key cannot be interpreted as an integer.
    #[error("Value at key {key} is not an integer")]
    NotAnInteger { key: String },

    /// A reply did not have the shape the client expected.
    #[error("Unexpected reply to {command}: {message}")]
    UnexpectedReply { command: String, message: String },
}

impl KvError {
    /// Creates a new `Pool` error.
    #[must_use]
    pub fn pool(message: impl ToString) -> Self {
        Self::Pool(message.to_string())
    }

    /// Creates a new `WrongType` error.
    #[must_use]
    pub fn wrong_type(key: impl Into<String>) -> Self {
        Self::WrongType { key: key.into() }
    }

    /// Creates a new `NotAnInteger` error.
    #[must_use]
    pub fn not_an_integer(key: impl Into<String>) -> Self {
        Self::NotAnInteger { key: key.into() }
    }

    /// Creates a new `UnexpectedReply` error.
    #[must_use]
    pub fn unexpected_reply(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedReply {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the store could not be reached at all.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Pool(_) => true,
            Self::Redis(e) => e.is_io_error() || e.is_connection_dropped() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Result type alias for key-value operations.
pub type KvResult<T> = std::result::Result<T, KvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KvError::pool("timed out");
        assert_eq!(err.to_string(), "Redis pool error: timed out");

        let err = KvError::not_an_integer("seckill:stock:1");
        assert_eq!(err.to_string(), "Value at key seckill:stock:1 is not an integer");
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(KvError::pool("down").is_unavailable());
        assert!(!KvError::wrong_type("k").is_unavailable());
        assert!(!KvError::unexpected_reply("SET", "bad").is_unavailable());
    }
}
