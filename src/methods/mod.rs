//! Request catalog.
//!
//! One type per remote operation. Each type builds its outbound [`Envelope`]
//! and interprets what comes back: call-style entries implement
//! [`RealtimeRequest`], subscription entries implement
//! [`RealtimeSubscription`].
//!
//! Builders are pure functions of their inputs. Correlation ids are handed in
//! by the caller (normally taken from the session's
//! [`SequenceAllocator`](crate::SequenceAllocator)), so every entry can be
//! exercised without a transport.

mod rooms;
mod session;
mod subscriptions;

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::{
    // ---
    CorrelationId,
    Envelope,
    ObjectResponse,
    Operation,
    PushHandler,
    Response,
    Result,
};

pub use rooms::{message_id, GetChannels, SendMessage, SendReaction, SendTypingEvent};
pub use session::{Connect, Login, Resume};
pub use subscriptions::{SubscribeToChannelChanges, SubscribeToChannelMessages, Unsubscribe};

/// A call-style catalog entry.
pub trait RealtimeRequest {
    /// Operation tag; selects the error kind raised on server failure.
    const OPERATION: Operation;

    /// Typed result of a successful call.
    type Output;

    /// Build the outbound envelope.
    fn envelope(&self) -> Envelope;

    /// Id the transport should correlate the response with.
    fn correlation_id(&self) -> Option<&CorrelationId>;

    /// Interpret the correlated response.
    ///
    /// Fails with the operation's error kind when the response carries an
    /// `error` field. Missing result fields are not errors.
    fn parse_response(response: Response) -> Result<Self::Output>;
}

/// A subscription catalog entry.
pub trait RealtimeSubscription {
    /// Operation tag; selects the error kind raised on server failure.
    const OPERATION: Operation;

    /// Event handed to the caller's callback for every push frame.
    type Event: Send + 'static;

    /// Build the `sub` envelope.
    fn envelope(&self) -> Envelope;

    /// Id that push frames for this subscription carry.
    fn subscription_id(&self) -> &CorrelationId;

    /// Turn one push frame into an event.
    ///
    /// `None` means the callback must not run for this frame.
    fn unwrap_event(frame: &Response) -> Option<Self::Event>;

    /// Interpret the subscription acknowledgement (`ready` or `nosub`).
    fn parse_ack(response: Response) -> Result<()> {
        response.ensure_ok(Self::OPERATION)
    }

    /// Adapt a typed callback into a transport push handler.
    fn wrap<F>(callback: F) -> PushHandler
    where
        Self: Sized + 'static,
        F: Fn(Self::Event) + Send + Sync + 'static,
    {
        Arc::new(move |frame: Response| {
            if let Some(event) = Self::unwrap_event(&frame) {
                callback(event);
            }
        })
    }
}

/// Lowercase hex SHA-256 of `input`.
pub(crate) fn sha256_hex(input: &str) -> String {
    // ---
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let bytes = hasher.finalize();
    bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
}

/// Shared parser for calls answering with `{"result": {"id": ...}}`.
pub(crate) fn parse_object_response(op: Operation, response: &Response) -> Result<ObjectResponse> {
    // ---
    response.ensure_ok(op)?;
    let id = response.get_str(&["result", "id"]).map(str::to_owned);
    Ok(ObjectResponse { id })
}
