// src/methods/rooms.rs

//! Room-level method calls: listing rooms, posting, reacting and typing.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};

use super::{parse_object_response, sha256_hex, RealtimeRequest};
use crate::{
    // ---
    get_field,
    log_warn,
    Channel,
    CorrelationId,
    Envelope,
    ObjectResponse,
    Operation,
    Response,
    Result,
};

/// Length of client-generated message ids.
const MESSAGE_ID_LEN: usize = 12;

/// Client-side message id for `sendMessage`.
///
/// The first 12 hex characters of the digest of
/// `"{correlation_id}:{seconds}.{micros}"`. Only needs to be unique for the
/// lifetime of one outgoing message.
pub fn message_id(id: &CorrelationId, timestamp: Duration) -> String {
    // ---
    let seed = format!("{id}:{}.{:06}", timestamp.as_secs(), timestamp.subsec_micros());
    let mut digest = sha256_hex(&seed);
    digest.truncate(MESSAGE_ID_LEN);
    digest
}

/// List the rooms the user is a member of.
#[derive(Debug, Clone, PartialEq)]
pub struct GetChannels {
    id: CorrelationId,
}

impl GetChannels {
    pub fn new(id: CorrelationId) -> Self {
        Self { id }
    }
}

impl RealtimeRequest for GetChannels {
    const OPERATION: Operation = Operation::GetChannels;
    type Output = Vec<Channel>;

    fn envelope(&self) -> Envelope {
        Envelope::method("rooms/get", self.id.clone(), vec![])
    }

    fn correlation_id(&self) -> Option<&CorrelationId> {
        Some(&self.id)
    }

    /// Rooms without an `_id` or `t` are skipped; order is preserved.
    fn parse_response(response: Response) -> Result<Vec<Channel>> {
        // ---
        response.ensure_ok(Self::OPERATION)?;

        let rooms = match response.get_field(&["result"]).and_then(Value::as_array) {
            Some(rooms) => rooms,
            None => return Ok(Vec::new()),
        };

        let channels = rooms
            .iter()
            .filter_map(|room| {
                let id = get_field(room, &["_id"]).and_then(Value::as_str);
                let kind = get_field(room, &["t"]).and_then(Value::as_str);
                match (id, kind) {
                    (Some(id), Some(kind)) => Some(Channel::new(id, kind)),
                    _ => {
                        log_warn!("skipping room without _id/t: {room}");
                        None
                    }
                }
            })
            .collect();

        Ok(channels)
    }
}

/// Post a text message, optionally inside a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct SendMessage {
    id: CorrelationId,
    channel_id: String,
    text: String,
    thread_id: Option<String>,
    timestamp: Duration,
}

impl SendMessage {
    /// Message stamped with the current wall-clock time.
    pub fn new(id: CorrelationId, channel_id: impl Into<String>, text: impl Into<String>) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        Self {
            id,
            channel_id: channel_id.into(),
            text: text.into(),
            thread_id: None,
            timestamp: now,
        }
    }

    /// Reply inside the thread rooted at `thread_id` (`tmid`).
    pub fn in_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Override the timestamp the message id is derived from.
    pub fn at(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Client-generated `_id` of the message.
    pub fn message_id(&self) -> String {
        message_id(&self.id, self.timestamp)
    }
}

impl RealtimeRequest for SendMessage {
    const OPERATION: Operation = Operation::SendMessage;
    type Output = ObjectResponse;

    fn envelope(&self) -> Envelope {
        // ---
        let mut message = json!({
            "_id": self.message_id(),
            "rid": self.channel_id,
            "msg": self.text,
        });

        if let (Some(thread_id), Some(fields)) = (&self.thread_id, message.as_object_mut()) {
            fields.insert("tmid".into(), Value::String(thread_id.clone()));
        }

        Envelope::method("sendMessage", self.id.clone(), vec![message])
    }

    fn correlation_id(&self) -> Option<&CorrelationId> {
        Some(&self.id)
    }

    fn parse_response(response: Response) -> Result<ObjectResponse> {
        parse_object_response(Self::OPERATION, &response)
    }
}

/// Toggle an emoji reaction on a message.
#[derive(Debug, Clone, PartialEq)]
pub struct SendReaction {
    id: CorrelationId,
    orig_msg_id: String,
    emoji: String,
}

impl SendReaction {
    pub fn new(id: CorrelationId, orig_msg_id: impl Into<String>, emoji: impl Into<String>) -> Self {
        Self {
            id,
            orig_msg_id: orig_msg_id.into(),
            emoji: emoji.into(),
        }
    }
}

impl RealtimeRequest for SendReaction {
    const OPERATION: Operation = Operation::SendReaction;
    type Output = ObjectResponse;

    fn envelope(&self) -> Envelope {
        Envelope::method(
            "setReaction",
            self.id.clone(),
            vec![json!(self.emoji), json!(self.orig_msg_id)],
        )
    }

    fn correlation_id(&self) -> Option<&CorrelationId> {
        Some(&self.id)
    }

    fn parse_response(response: Response) -> Result<ObjectResponse> {
        parse_object_response(Self::OPERATION, &response)
    }
}

/// Broadcast the `typing` state of `username` in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct SendTypingEvent {
    id: CorrelationId,
    channel_id: String,
    username: String,
    is_typing: bool,
}

impl SendTypingEvent {
    pub fn new(
        id: CorrelationId,
        channel_id: impl Into<String>,
        username: impl Into<String>,
        is_typing: bool,
    ) -> Self {
        Self {
            id,
            channel_id: channel_id.into(),
            username: username.into(),
            is_typing,
        }
    }
}

impl RealtimeRequest for SendTypingEvent {
    const OPERATION: Operation = Operation::SendTypingEvent;
    type Output = ObjectResponse;

    fn envelope(&self) -> Envelope {
        Envelope::method(
            "stream-notify-room",
            self.id.clone(),
            vec![
                json!(format!("{}/typing", self.channel_id)),
                json!(self.username),
                json!(self.is_typing),
            ],
        )
    }

    fn correlation_id(&self) -> Option<&CorrelationId> {
        Some(&self.id)
    }

    fn parse_response(response: Response) -> Result<ObjectResponse> {
        parse_object_response(Self::OPERATION, &response)
    }
}
