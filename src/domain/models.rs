// src/domain/models.rs

//! Typed results produced by the request catalog.

use serde::{Deserialize, Serialize};

/// Common call result: the `result.id` echoed by the server.
///
/// `id` is `None` when the server answered without one; callers must not
/// assume it is present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectResponse {
    pub id: Option<String>,
}

/// A chat room and its kind.
///
/// `channel_type` is the opaque `t` tag (`"c"`, `"p"`, `"d"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub channel_type: String,
}

impl Channel {
    pub fn new(id: impl Into<String>, channel_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel_type: channel_type.into(),
        }
    }
}

/// A message pushed on a `stream-room-messages` subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMessage {
    pub channel_id: String,
    pub sender_id: String,
    pub message_id: String,
    /// Parent message when posted in a thread (`tmid`).
    pub thread_id: Option<String>,
    pub text: String,
    /// System message type (`t`), absent for regular user messages.
    pub qualifier: Option<String>,
}
