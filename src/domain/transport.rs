// src/domain/transport.rs

//! Transport domain abstractions.
//!
//! This module defines the contract between the request catalog and whatever
//! owns the physical connection. It intentionally avoids any reference to
//! sockets, framing or reconnect policy.
//!
//! The transport is responsible for delivering envelopes and for routing
//! inbound frames back by correlation id. Building envelopes and interpreting
//! responses is handled by the catalog in `src/methods/`.
//!
//! Concrete implementations live under `src/transport/`.

use std::sync::Arc;

use crate::{CorrelationId, Envelope, Response, Result};

/// Callback registered for a subscription.
///
/// The transport invokes it synchronously once per matching push frame, in
/// delivery order. Catalog entries build these with
/// [`RealtimeSubscription::wrap`](crate::RealtimeSubscription::wrap).
pub type PushHandler = Arc<dyn Fn(Response) + Send + Sync>;

/// Transport abstraction.
///
/// Implementations must ensure that:
/// - `call_method()` resolves with the frame correlated by id, or fails with
///   [`RpcError::ConnectionLost`](crate::RpcError::ConnectionLost) when the
///   connection drops first. Responses may arrive in any order.
/// - once `create_subscription()` has registered the handler, every push
///   frame for that id reaches it.
/// - no retries, timeouts or backpressure are applied on the caller's behalf.
///
/// The in-memory transport serves as the reference implementation of these
/// semantics.
///
/// # Notes
///
/// This trait uses `async_trait`; consumers should treat methods as normal
/// `async fn`s.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Send a call-style envelope.
    ///
    /// With a correlation id, resolves with the matching response frame. The
    /// handshake resolves with the `connected`/`failed` frame. Other id-less
    /// envelopes are fire-and-forget and resolve with an empty response.
    async fn call_method(
        &self,
        envelope: Envelope,
        correlation_id: Option<CorrelationId>,
    ) -> Result<Response>;

    /// Register `handler` for push frames carrying `correlation_id`, send the
    /// subscription envelope and resolve with the server acknowledgement.
    async fn create_subscription(
        &self,
        envelope: Envelope,
        correlation_id: CorrelationId,
        handler: PushHandler,
    ) -> Result<Response>;

    /// Close the transport and fail every outstanding call.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// `.clone()` is cheap and every clone shares the same connection.
pub type TransportPtr = Arc<dyn Transport>;
