//! In-memory transport implementation.
//!
//! This module provides a pure in-process implementation of the domain-level
//! `Transport` trait. It is intended primarily for testing, local execution,
//! and as a reference for transport semantics.
//!
//! ## Reference Semantics
//!
//! The in-memory transport defines the **reference behavior** for the
//! transport layer:
//!
//! - Outbound envelopes are serialized exactly as they would go on the wire
//!   and handed, in order, to the [`MemoryPeer`].
//! - Inbound frames delivered by the peer are routed synchronously by the
//!   [`Dispatcher`]; push handlers run on the delivering task.
//! - Once `create_subscription()` has sent the `sub` envelope, push frames for
//!   that id are deliverable.
//! - Closing the transport, or dropping the peer, fails every waiting call
//!   with `RpcError::ConnectionLost`.
//!
//! ## Non-Goals
//!
//! This transport does not emulate a Rocket.Chat server. The peer decides
//! what, and whether, to answer.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::mpsc;

use super::Dispatcher;
use crate::{
    // ---
    log_debug,
    log_trace,
    log_warn,
    CorrelationId,
    Envelope,
    PushHandler,
    Response,
    Result,
    RpcError,
    Transport,
    TransportPtr,
};

/// In-memory transport.
///
/// Created in a pair with its [`MemoryPeer`] by
/// [`create_memory_transport`](crate::create_memory_transport).
pub struct MemoryTransport {
    // ---
    dispatcher: Dispatcher,
    outbox: mpsc::UnboundedSender<Bytes>,
}

impl MemoryTransport {
    // ---
    fn send(&self, envelope: &Envelope) -> Result<()> {
        // ---
        let frame = envelope.to_bytes()?;
        log_trace!("outbound {}", String::from_utf8_lossy(&frame));

        self.outbox.send(frame).map_err(|_| {
            log_warn!("peer gone, dropping {} envelope", envelope.kind());
            RpcError::ConnectionLost
        })
    }

    /// Registries shared with the peer.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---
    async fn call_method(
        &self,
        envelope: Envelope,
        correlation_id: Option<CorrelationId>,
    ) -> Result<Response> {
        // ---
        let rx = match (&correlation_id, &envelope) {
            (Some(id), _) => self.dispatcher.register_call(id.clone())?,
            (None, Envelope::Connect { .. }) => self.dispatcher.register_handshake()?,
            (None, _) => {
                self.send(&envelope)?;
                return Ok(Response::empty());
            }
        };

        if let Err(err) = self.send(&envelope) {
            if let Some(id) = &correlation_id {
                self.dispatcher.forget_call(id);
            }
            return Err(err);
        }

        rx.await.map_err(|_| RpcError::ConnectionLost)
    }

    async fn create_subscription(
        &self,
        envelope: Envelope,
        correlation_id: CorrelationId,
        handler: PushHandler,
    ) -> Result<Response> {
        // ---
        self.dispatcher
            .register_subscription(correlation_id.clone(), handler)?;
        if let Some((collection, event_name)) = envelope.stream() {
            self.dispatcher
                .bind_stream(correlation_id.clone(), collection, event_name)?;
        }
        let ack = self.dispatcher.register_call(correlation_id.clone())?;

        if let Err(err) = self.send(&envelope) {
            self.dispatcher.forget_call(&correlation_id);
            self.dispatcher.remove_subscription(&correlation_id);
            return Err(err);
        }

        ack.await.map_err(|_| RpcError::ConnectionLost)
    }

    /// Close the transport.
    ///
    /// For the in-memory transport, this clears all registries.
    async fn close(&self) -> Result<()> {
        // ---
        self.dispatcher.close();
        Ok(())
    }
}

/// The far side of a [`MemoryTransport`].
///
/// Plays the server in tests: reads what the client sent and delivers
/// whatever frames the test wants the client to see.
pub struct MemoryPeer {
    inbox: mpsc::UnboundedReceiver<Bytes>,
    transport: Arc<MemoryTransport>,
}

impl MemoryPeer {
    // ---
    /// Next outbound frame, decoded.
    pub async fn recv(&mut self) -> Option<Value> {
        // ---
        let frame = self.inbox.recv().await?;
        match serde_json::from_slice(&frame) {
            Ok(value) => Some(value),
            Err(_err) => {
                log_warn!("undecodable outbound frame: {_err}");
                None
            }
        }
    }

    /// Next outbound frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Value> {
        let frame = self.inbox.try_recv().ok()?;
        serde_json::from_slice(&frame).ok()
    }

    /// Deliver an inbound frame to the client side.
    ///
    /// Returns `true` when it reached a waiting call or a push handler.
    pub fn deliver(&self, frame: Value) -> bool {
        self.transport.dispatcher.dispatch(Response::new(frame))
    }

    /// Answer a call with `{"msg": "result", "id": id, "result": result}`.
    pub fn reply_result(&self, id: &str, result: Value) -> bool {
        self.deliver(serde_json::json!({ "msg": "result", "id": id, "result": result }))
    }

    /// Answer a call with `{"msg": "result", "id": id, "error": error}`.
    pub fn reply_error(&self, id: &str, error: Value) -> bool {
        self.deliver(serde_json::json!({ "msg": "result", "id": id, "error": error }))
    }

    /// Borrow the transport this peer is attached to.
    pub fn transport(&self) -> &MemoryTransport {
        &self.transport
    }
}

impl Drop for MemoryPeer {
    // ---
    /// The server is gone: release every waiting call.
    fn drop(&mut self) {
        log_debug!("memory peer dropped, closing dispatcher");
        self.transport.dispatcher.close();
    }
}

/// Create a new in-memory transport and the peer driving it.
///
/// This transport is always available and requires no external resources.
pub async fn create_transport() -> Result<(TransportPtr, MemoryPeer)> {
    // ---
    let (outbox, inbox) = mpsc::unbounded_channel();

    let transport = Arc::new(MemoryTransport {
        dispatcher: Dispatcher::new(),
        outbox,
    });

    log_debug!("memory transport created");

    let peer = MemoryPeer {
        inbox,
        transport: transport.clone(),
    };

    let transport: TransportPtr = transport;
    Ok((transport, peer))
}
