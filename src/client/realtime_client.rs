// src/client/realtime_client.rs
//! Realtime client session.
//!
//! This module contains [`RealtimeClient`], which issues catalog operations
//! over a transport.
//!
//! # Architecture
//!
//! Every call takes a fresh correlation id from the session's
//! [`SequenceAllocator`], builds the catalog envelope and hands it to the
//! transport. The transport resolves the call with the correlated frame,
//! which the catalog entry then parses. Subscriptions register the catalog's
//! wrapped callback with the transport and return their id as the handle for
//! a later [`unsubscribe`](RealtimeClient::unsubscribe).
//!
//! # Concurrency
//!
//! Multiple calls can be in flight simultaneously; correlation is by id
//! alone, so responses may arrive in any order. The allocator is the only
//! shared mutable state and is updated atomically.

use std::sync::Arc;

use crate::methods::{
    // ---
    Connect,
    GetChannels,
    Login,
    RealtimeRequest,
    RealtimeSubscription,
    Resume,
    SendMessage,
    SendReaction,
    SendTypingEvent,
    SubscribeToChannelChanges,
    SubscribeToChannelMessages,
    Unsubscribe,
};
use crate::{
    // ---
    log_debug,
    log_error,
    log_info,
    Channel,
    CorrelationId,
    ObjectResponse,
    RealtimeConfig,
    Result,
    RoomMessage,
    SequenceAllocator,
    TransportPtr,
};

/// Running realtime session.
///
/// Cheap to clone (internally `Arc`-backed).
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    transport: TransportPtr,
    sequence: Arc<SequenceAllocator>,
    config: RealtimeConfig,
}

impl RealtimeClient {
    /// Create a session over `transport` (internal use by the builder).
    pub(crate) fn new(
        transport: TransportPtr,
        sequence: Arc<SequenceAllocator>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                sequence,
                config,
            }),
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.inner.config
    }

    /// Allocator this session draws correlation ids from.
    pub fn sequence(&self) -> &Arc<SequenceAllocator> {
        &self.inner.sequence
    }

    fn next_id(&self) -> CorrelationId {
        self.inner.sequence.next()
    }

    /// Send one call-style catalog entry and parse its response.
    async fn call<R: RealtimeRequest>(&self, request: R) -> Result<R::Output> {
        // ---
        let envelope = request.envelope();
        let correlation_id = request.correlation_id().cloned();

        log_debug!(
            "{}: {} ({}) id={:?}",
            self.inner.config.client_id,
            R::OPERATION,
            envelope.kind(),
            correlation_id.as_ref().map(CorrelationId::as_str),
        );

        let response = match self
            .inner
            .transport
            .call_method(envelope, correlation_id)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                log_error!(
                    "{}: {} failed in transport: {err}",
                    self.inner.config.client_id,
                    R::OPERATION
                );
                return Err(err);
            }
        };

        R::parse_response(response)
    }

    /// Open one subscription and return its id.
    async fn subscribe<S, F>(&self, subscription: S, callback: F) -> Result<CorrelationId>
    where
        S: RealtimeSubscription + 'static,
        F: Fn(S::Event) + Send + Sync + 'static,
    {
        // ---
        let id = subscription.subscription_id().clone();

        log_debug!(
            "{}: {} id={id}",
            self.inner.config.client_id,
            S::OPERATION
        );

        let ack = self
            .inner
            .transport
            .create_subscription(subscription.envelope(), id.clone(), S::wrap(callback))
            .await?;

        S::parse_ack(ack)?;
        Ok(id)
    }

    /// Perform the DDP handshake.
    ///
    /// # Errors
    ///
    /// `RpcError::Connect` when the server refuses the handshake.
    pub async fn connect(&self) -> Result<()> {
        // ---
        let config = &self.inner.config;
        let request = Connect::with_versions(
            config.protocol_version.clone(),
            config.supported_versions.clone(),
        );

        self.call(request).await?;
        log_info!("{}: connected", config.client_id);
        Ok(())
    }

    /// Log in with a resume token.
    ///
    /// # Errors
    ///
    /// `RpcError::Resume` when the server rejects the token.
    pub async fn resume(&self, token: &str) -> Result<ObjectResponse> {
        self.call(Resume::new(self.next_id(), token)).await
    }

    /// Log in with username and password.
    ///
    /// Only the SHA-256 digest of `password` is sent.
    ///
    /// # Errors
    ///
    /// `RpcError::Login` when the server rejects the credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<ObjectResponse> {
        // ---
        let result = self
            .call(Login::new(self.next_id(), username, password))
            .await?;
        log_info!("{}: logged in as {username}", self.inner.config.client_id);
        Ok(result)
    }

    /// Rooms the logged-in user is a member of.
    ///
    /// # Errors
    ///
    /// `RpcError::GetChannels` on server failure.
    pub async fn get_channels(&self) -> Result<Vec<Channel>> {
        self.call(GetChannels::new(self.next_id())).await
    }

    /// Post `text` to `channel_id`, optionally as a reply in a thread.
    ///
    /// # Errors
    ///
    /// `RpcError::SendMessage` on server failure.
    pub async fn send_message(
        &self,
        text: &str,
        channel_id: &str,
        thread_id: Option<&str>,
    ) -> Result<ObjectResponse> {
        // ---
        let mut request = SendMessage::new(self.next_id(), channel_id, text);
        if let Some(thread_id) = thread_id {
            request = request.in_thread(thread_id);
        }
        self.call(request).await
    }

    /// React to `orig_msg_id` with `emoji` (e.g. `":thumbsup:"`).
    ///
    /// # Errors
    ///
    /// `RpcError::SendReaction` on server failure.
    pub async fn send_reaction(&self, orig_msg_id: &str, emoji: &str) -> Result<ObjectResponse> {
        self.call(SendReaction::new(self.next_id(), orig_msg_id, emoji))
            .await
    }

    /// Tell the room whether `username` is typing.
    ///
    /// # Errors
    ///
    /// `RpcError::SendTypingEvent` on server failure.
    pub async fn send_typing_event(
        &self,
        channel_id: &str,
        username: &str,
        is_typing: bool,
    ) -> Result<ObjectResponse> {
        self.call(SendTypingEvent::new(
            self.next_id(),
            channel_id,
            username,
            is_typing,
        ))
        .await
    }

    /// Invoke `callback` for every message posted in `channel_id`.
    ///
    /// Returns the subscription id to pass to [`unsubscribe`](Self::unsubscribe).
    ///
    /// # Errors
    ///
    /// `RpcError::SubscribeToChannelMessages` when the server refuses the
    /// subscription.
    pub async fn subscribe_to_channel_messages<F>(
        &self,
        channel_id: &str,
        callback: F,
    ) -> Result<CorrelationId>
    where
        F: Fn(RoomMessage) + Send + Sync + 'static,
    {
        let subscription = SubscribeToChannelMessages::new(self.next_id(), channel_id);
        self.subscribe(subscription, callback).await
    }

    /// Invoke `callback` for every room of `user_id` that is created or
    /// updated. Removals are not reported.
    ///
    /// Returns the subscription id to pass to [`unsubscribe`](Self::unsubscribe).
    ///
    /// # Errors
    ///
    /// `RpcError::SubscribeToChannelChanges` when the server refuses the
    /// subscription.
    pub async fn subscribe_to_channel_changes<F>(
        &self,
        user_id: &str,
        callback: F,
    ) -> Result<CorrelationId>
    where
        F: Fn(Channel) + Send + Sync + 'static,
    {
        let subscription = SubscribeToChannelChanges::new(self.next_id(), user_id);
        self.subscribe(subscription, callback).await
    }

    /// Cancel a subscription.
    ///
    /// # Errors
    ///
    /// `RpcError::Unsubscribe` on server failure.
    pub async fn unsubscribe(&self, subscription_id: &CorrelationId) -> Result<()> {
        self.call(Unsubscribe::new(subscription_id.clone())).await
    }

    /// Close the underlying transport.
    pub async fn close(&self) -> Result<()> {
        // ---
        log_debug!("{}: closing transport", self.inner.config.client_id);
        self.inner.transport.close().await
    }
}
