// src/domain/envelope.rs

//! Outbound protocol envelopes.
//!
//! An [`Envelope`] is the unit handed to the transport. The `msg` field is the
//! discriminator; every other field name is fixed by the remote protocol and
//! reproduced verbatim on the wire.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::{CorrelationId, Result};

/// An outbound protocol message.
///
/// Built fresh for every call by a catalog entry and never mutated after it is
/// handed to the transport.
///
/// # Example
///
/// ```
/// # use rocketchat_realtime::{CorrelationId, Envelope};
/// # use serde_json::json;
/// let env = Envelope::method("rooms/get", CorrelationId::from(7u64), vec![]);
/// assert_eq!(
///     env.to_value().unwrap(),
///     json!({"msg": "method", "method": "rooms/get", "id": "7", "params": []}),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "msg", rename_all = "lowercase")]
pub enum Envelope {
    /// Session handshake.
    Connect {
        version: String,
        support: Vec<String>,
    },

    /// Remote method call.
    Method {
        method: String,
        id: CorrelationId,
        params: Vec<Value>,
    },

    /// Open a named subscription.
    Sub {
        id: CorrelationId,
        name: String,
        params: Vec<Value>,
    },

    /// Cancel a subscription previously opened with the same id.
    Unsub { id: CorrelationId },
}

impl Envelope {
    // ---
    /// Create a handshake envelope.
    pub fn connect(version: impl Into<String>, support: Vec<String>) -> Self {
        Envelope::Connect {
            version: version.into(),
            support,
        }
    }

    /// Create a method call envelope.
    pub fn method(method: impl Into<String>, id: CorrelationId, params: Vec<Value>) -> Self {
        Envelope::Method {
            method: method.into(),
            id,
            params,
        }
    }

    /// Create a subscription envelope.
    pub fn sub(name: impl Into<String>, id: CorrelationId, params: Vec<Value>) -> Self {
        Envelope::Sub {
            id,
            name: name.into(),
            params,
        }
    }

    /// Create an unsubscription envelope.
    pub fn unsub(id: CorrelationId) -> Self {
        Envelope::Unsub { id }
    }

    /// Value of the `msg` discriminator.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Connect { .. } => "connect",
            Envelope::Method { .. } => "method",
            Envelope::Sub { .. } => "sub",
            Envelope::Unsub { .. } => "unsub",
        }
    }

    /// Correlation id carried in the envelope, if any.
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        match self {
            Envelope::Connect { .. } => None,
            Envelope::Method { id, .. } | Envelope::Sub { id, .. } | Envelope::Unsub { id } => {
                Some(id)
            }
        }
    }

    /// Positional parameters (empty for `connect` and `unsub`).
    pub fn params(&self) -> &[Value] {
        match self {
            Envelope::Method { params, .. } | Envelope::Sub { params, .. } => params,
            Envelope::Connect { .. } | Envelope::Unsub { .. } => &[],
        }
    }

    /// Stream a `sub` envelope listens on: its name and first parameter.
    ///
    /// Stream push frames echo these as `collection` and `fields.eventName`.
    pub fn stream(&self) -> Option<(&str, &str)> {
        match self {
            Envelope::Sub { name, params, .. } => Some((name.as_str(), params.first()?.as_str()?)),
            _ => None,
        }
    }

    /// Render the envelope as a JSON value.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Serialize the envelope into a text frame payload.
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}
