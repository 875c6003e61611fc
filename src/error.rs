use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Remote operation a request or subscription belongs to.
///
/// Every catalog entry carries one of these tags; server-reported failures
/// are mapped to the [`RpcError`] variant of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Resume,
    Login,
    GetChannels,
    SendMessage,
    SendReaction,
    SendTypingEvent,
    SubscribeToChannelMessages,
    SubscribeToChannelChanges,
    Unsubscribe,
}

impl Operation {
    /// Stable name used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Resume => "resume",
            Operation::Login => "login",
            Operation::GetChannels => "get-channels",
            Operation::SendMessage => "send-message",
            Operation::SendReaction => "send-reaction",
            Operation::SendTypingEvent => "send-typing-event",
            Operation::SubscribeToChannelMessages => "subscribe-channel-messages",
            Operation::SubscribeToChannelChanges => "subscribe-channel-changes",
            Operation::Unsubscribe => "unsubscribe",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error detail reported by the server, kept exactly as received.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerError(pub Value);

impl ServerError {
    /// Borrow the raw detail.
    pub fn detail(&self) -> &Value {
        &self.0
    }

    /// Server error code (`error` field of a Meteor error), if any.
    pub fn code(&self) -> Option<&Value> {
        self.0.get("error")
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Meteor errors carry a human readable `reason` or `message`.
        let text = ["reason", "message"]
            .iter()
            .find_map(|key| self.0.get(*key).and_then(Value::as_str));

        match text {
            Some(text) => f.write_str(text),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Errors that can occur during realtime operations.
///
/// The first ten variants are the per-operation failures raised when the
/// server answers with an `error` field. Use [`RpcError::server_error`] to
/// handle all of them at once.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("connect failed: {0}")]
    Connect(ServerError),

    #[error("resume failed: {0}")]
    Resume(ServerError),

    #[error("login failed: {0}")]
    Login(ServerError),

    #[error("get channels failed: {0}")]
    GetChannels(ServerError),

    #[error("send message failed: {0}")]
    SendMessage(ServerError),

    #[error("send reaction failed: {0}")]
    SendReaction(ServerError),

    #[error("send typing event failed: {0}")]
    SendTypingEvent(ServerError),

    #[error("subscribe to channel messages failed: {0}")]
    SubscribeToChannelMessages(ServerError),

    #[error("subscribe to channel changes failed: {0}")]
    SubscribeToChannelChanges(ServerError),

    #[error("unsubscribe failed: {0}")]
    Unsubscribe(ServerError),

    /// Connection dropped before a correlated response arrived.
    #[error("connection lost")]
    ConnectionLost,

    /// Transport-level failure other than a dropped connection.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Required builder input was not provided.
    #[error("missing configuration: {0}")]
    MissingConfig(String),
}

impl RpcError {
    /// Build the failure kind that matches `op`.
    pub fn server(op: Operation, detail: Value) -> Self {
        // ---
        let err = ServerError(detail);
        match op {
            Operation::Connect => RpcError::Connect(err),
            Operation::Resume => RpcError::Resume(err),
            Operation::Login => RpcError::Login(err),
            Operation::GetChannels => RpcError::GetChannels(err),
            Operation::SendMessage => RpcError::SendMessage(err),
            Operation::SendReaction => RpcError::SendReaction(err),
            Operation::SendTypingEvent => RpcError::SendTypingEvent(err),
            Operation::SubscribeToChannelMessages => RpcError::SubscribeToChannelMessages(err),
            Operation::SubscribeToChannelChanges => RpcError::SubscribeToChannelChanges(err),
            Operation::Unsubscribe => RpcError::Unsubscribe(err),
        }
    }

    /// Operation whose server-reported failure this is.
    ///
    /// `None` for transport, serialization and configuration errors.
    pub fn operation(&self) -> Option<Operation> {
        // ---
        let op = match self {
            RpcError::Connect(_) => Operation::Connect,
            RpcError::Resume(_) => Operation::Resume,
            RpcError::Login(_) => Operation::Login,
            RpcError::GetChannels(_) => Operation::GetChannels,
            RpcError::SendMessage(_) => Operation::SendMessage,
            RpcError::SendReaction(_) => Operation::SendReaction,
            RpcError::SendTypingEvent(_) => Operation::SendTypingEvent,
            RpcError::SubscribeToChannelMessages(_) => Operation::SubscribeToChannelMessages,
            RpcError::SubscribeToChannelChanges(_) => Operation::SubscribeToChannelChanges,
            RpcError::Unsubscribe(_) => Operation::Unsubscribe,
            RpcError::ConnectionLost
            | RpcError::Transport(_)
            | RpcError::Serialization(_)
            | RpcError::MissingConfig(_) => return None,
        };
        Some(op)
    }

    /// Server-provided detail for any per-operation failure.
    pub fn server_error(&self) -> Option<&ServerError> {
        // ---
        match self {
            RpcError::Connect(e)
            | RpcError::Resume(e)
            | RpcError::Login(e)
            | RpcError::GetChannels(e)
            | RpcError::SendMessage(e)
            | RpcError::SendReaction(e)
            | RpcError::SendTypingEvent(e)
            | RpcError::SubscribeToChannelMessages(e)
            | RpcError::SubscribeToChannelChanges(e)
            | RpcError::Unsubscribe(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias for realtime operations.
pub type Result<T> = std::result::Result<T, RpcError>;
