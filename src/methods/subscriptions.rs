// src/methods/subscriptions.rs

//! Server-push subscriptions and their cancellation.

use serde_json::{json, Value};

use super::{RealtimeRequest, RealtimeSubscription};
use crate::{
    // ---
    get_field,
    log_debug,
    log_warn,
    Channel,
    CorrelationId,
    Envelope,
    Operation,
    Response,
    Result,
    RoomMessage,
};

/// Positional arguments of a push frame (`fields.args`).
fn push_args(frame: &Response) -> Option<&Vec<Value>> {
    frame.get_field(&["fields", "args"]).and_then(Value::as_array)
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    get_field(value, path)
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Every message posted in one room.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeToChannelMessages {
    id: CorrelationId,
    channel_id: String,
}

impl SubscribeToChannelMessages {
    pub fn new(id: CorrelationId, channel_id: impl Into<String>) -> Self {
        Self {
            id,
            channel_id: channel_id.into(),
        }
    }
}

impl RealtimeSubscription for SubscribeToChannelMessages {
    const OPERATION: Operation = Operation::SubscribeToChannelMessages;
    type Event = RoomMessage;

    fn envelope(&self) -> Envelope {
        Envelope::sub(
            "stream-room-messages",
            self.id.clone(),
            vec![
                json!(self.channel_id),
                json!({ "useCollection": false, "args": [] }),
            ],
        )
    }

    fn subscription_id(&self) -> &CorrelationId {
        &self.id
    }

    /// The message is the first push argument. Frames missing `_id`, `rid` or
    /// `u._id` are dropped; a missing `msg` reads as empty text.
    fn unwrap_event(frame: &Response) -> Option<RoomMessage> {
        // ---
        let event = push_args(frame)?.first()?;

        let required = (
            string_at(event, &["rid"]),
            string_at(event, &["u", "_id"]),
            string_at(event, &["_id"]),
        );

        let (channel_id, sender_id, message_id) = match required {
            (Some(rid), Some(sender), Some(id)) => (rid, sender, id),
            _ => {
                log_warn!("malformed room message push frame: {event}");
                return None;
            }
        };

        Some(RoomMessage {
            channel_id,
            sender_id,
            message_id,
            thread_id: string_at(event, &["tmid"]),
            text: string_at(event, &["msg"]).unwrap_or_default(),
            qualifier: string_at(event, &["t"]),
        })
    }
}

/// Rooms of a user being created, updated or removed.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeToChannelChanges {
    id: CorrelationId,
    user_id: String,
}

impl SubscribeToChannelChanges {
    pub fn new(id: CorrelationId, user_id: impl Into<String>) -> Self {
        Self {
            id,
            user_id: user_id.into(),
        }
    }
}

impl RealtimeSubscription for SubscribeToChannelChanges {
    const OPERATION: Operation = Operation::SubscribeToChannelChanges;
    type Event = Channel;

    fn envelope(&self) -> Envelope {
        Envelope::sub(
            "stream-notify-user",
            self.id.clone(),
            vec![json!(format!("{}/rooms-changed", self.user_id)), json!(false)],
        )
    }

    fn subscription_id(&self) -> &CorrelationId {
        &self.id
    }

    /// Push arguments are `[action, room]`. Removals produce no event.
    fn unwrap_event(frame: &Response) -> Option<Channel> {
        // ---
        let args = push_args(frame)?;

        if args.first().and_then(Value::as_str) == Some("removed") {
            log_debug!("room removal suppressed");
            return None;
        }

        let room = args.get(1)?;
        match (string_at(room, &["_id"]), string_at(room, &["t"])) {
            (Some(id), Some(kind)) => Some(Channel::new(id, kind)),
            _ => {
                log_warn!("malformed room change push frame: {room}");
                None
            }
        }
    }
}

/// Cancel a subscription by the id its subscribe call returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Unsubscribe {
    subscription_id: CorrelationId,
}

impl Unsubscribe {
    pub fn new(subscription_id: CorrelationId) -> Self {
        Self { subscription_id }
    }
}

impl RealtimeRequest for Unsubscribe {
    const OPERATION: Operation = Operation::Unsubscribe;
    type Output = ();

    fn envelope(&self) -> Envelope {
        Envelope::unsub(self.subscription_id.clone())
    }

    fn correlation_id(&self) -> Option<&CorrelationId> {
        Some(&self.subscription_id)
    }

    fn parse_response(response: Response) -> Result<()> {
        response.ensure_ok(Self::OPERATION)
    }
}
