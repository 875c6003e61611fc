// src/methods/session.rs

//! Handshake and authentication: `connect`, token resume and password login.

use std::fmt;

use serde_json::{json, Value};

use super::{parse_object_response, sha256_hex, RealtimeRequest};
use crate::{
    // ---
    log_debug,
    CorrelationId,
    Envelope,
    ObjectResponse,
    Operation,
    Response,
    Result,
    RpcError,
};

/// Open the DDP session.
#[derive(Debug, Clone, PartialEq)]
pub struct Connect {
    version: String,
    support: Vec<String>,
}

impl Connect {
    /// Handshake for protocol version `"1"`.
    pub fn new() -> Self {
        Self::with_versions("1", vec!["1".to_string()])
    }

    /// Handshake proposing `version` and advertising `support`.
    pub fn with_versions(version: impl Into<String>, support: Vec<String>) -> Self {
        Self {
            version: version.into(),
            support,
        }
    }
}

impl Default for Connect {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeRequest for Connect {
    const OPERATION: Operation = Operation::Connect;
    type Output = ();

    fn envelope(&self) -> Envelope {
        Envelope::connect(self.version.clone(), self.support.clone())
    }

    fn correlation_id(&self) -> Option<&CorrelationId> {
        None
    }

    fn parse_response(response: Response) -> Result<()> {
        // ---
        response.ensure_ok(Self::OPERATION)?;

        // The server refuses the handshake with a `failed` frame naming the
        // version it would accept instead.
        if response.msg() == Some("failed") {
            return Err(RpcError::server(Self::OPERATION, response.into_content()));
        }

        log_debug!("connected, session {:?}", response.get_str(&["session"]));
        Ok(())
    }
}

/// Log in with a previously issued resume token.
#[derive(Debug, Clone, PartialEq)]
pub struct Resume {
    id: CorrelationId,
    token: String,
}

impl Resume {
    pub fn new(id: CorrelationId, token: impl Into<String>) -> Self {
        Self {
            id,
            token: token.into(),
        }
    }
}

impl RealtimeRequest for Resume {
    const OPERATION: Operation = Operation::Resume;
    type Output = ObjectResponse;

    fn envelope(&self) -> Envelope {
        Envelope::method(
            "login",
            self.id.clone(),
            vec![json!({ "resume": self.token })],
        )
    }

    fn correlation_id(&self) -> Option<&CorrelationId> {
        Some(&self.id)
    }

    fn parse_response(response: Response) -> Result<ObjectResponse> {
        parse_object_response(Self::OPERATION, &response)
    }
}

/// Log in with username and password.
///
/// Only the SHA-256 digest of the password is kept; the plaintext never
/// reaches the envelope.
#[derive(Clone, PartialEq)]
pub struct Login {
    id: CorrelationId,
    username: String,
    password_digest: String,
}

impl Login {
    pub fn new(id: CorrelationId, username: impl Into<String>, password: &str) -> Self {
        Self {
            id,
            username: username.into(),
            password_digest: sha256_hex(password),
        }
    }

    fn params(&self) -> Value {
        json!({
            "user": { "username": self.username },
            "password": { "digest": self.password_digest, "algorithm": "sha-256" },
        })
    }
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("id", &self.id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl RealtimeRequest for Login {
    const OPERATION: Operation = Operation::Login;
    type Output = ObjectResponse;

    fn envelope(&self) -> Envelope {
        Envelope::method("login", self.id.clone(), vec![self.params()])
    }

    fn correlation_id(&self) -> Option<&CorrelationId> {
        Some(&self.id)
    }

    fn parse_response(response: Response) -> Result<ObjectResponse> {
        parse_object_response(Self::OPERATION, &response)
    }
}
