//! Realtime client builder.
//!
//! Provides a fluent builder API for configuring [`RealtimeClient`]
//! instances over an already connected transport.

use std::sync::Arc;

use crate::{
    // ---
    RealtimeClient,
    RealtimeConfig,
    Result,
    RpcError,
    SequenceAllocator,
    TransportPtr,
};

/// Builder for creating realtime client sessions.
///
/// Accepts a transport and allows an optional shared sequence allocator and
/// session configuration.
///
/// # Examples
///
/// ## Session over the in-memory transport
/// ```no_run
/// use rocketchat_realtime::{create_memory_transport, RealtimeClientBuilder};
///
/// # async fn example() -> rocketchat_realtime::Result<()> {
/// let (transport, _peer) = create_memory_transport().await?;
///
/// let client = RealtimeClientBuilder::new(transport)
///     .client_id("support-bot")
///     .build()?;
///
/// client.connect().await?;
/// # Ok(())
/// # }
/// ```
///
/// ## Two sessions drawing from one id sequence
/// ```
/// use std::sync::Arc;
/// use rocketchat_realtime::{create_memory_transport, RealtimeClientBuilder, SequenceAllocator};
///
/// # async fn example() -> rocketchat_realtime::Result<()> {
/// let sequence = Arc::new(SequenceAllocator::new());
/// let (first, _p1) = create_memory_transport().await?;
/// let (second, _p2) = create_memory_transport().await?;
///
/// let a = RealtimeClientBuilder::new(first).sequence(sequence.clone()).build()?;
/// let b = RealtimeClientBuilder::new(second).sequence(sequence).build()?;
/// assert!(Arc::ptr_eq(a.sequence(), b.sequence()));
/// # Ok(())
/// # }
/// ```
pub struct RealtimeClientBuilder {
    // ---
    transport: TransportPtr,
    sequence: Option<Arc<SequenceAllocator>>,
    config: Option<RealtimeConfig>,
    client_id: Option<String>,
}

impl RealtimeClientBuilder {
    /// Create a new client builder.
    pub fn new(transport: TransportPtr) -> Self {
        // ---
        Self {
            transport,
            sequence: None,
            config: None,
            client_id: None,
        }
    }

    /// Share an existing allocator instead of starting a fresh sequence.
    pub fn sequence(mut self, sequence: Arc<SequenceAllocator>) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Set the session configuration.
    ///
    /// Default: [`RealtimeConfig::default`].
    pub fn config(mut self, config: RealtimeConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the session id used in log lines.
    ///
    /// Takes precedence over the `client_id` of [`config`](Self::config).
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Build the client (consumes self).
    ///
    /// # Errors
    ///
    /// `RpcError::MissingConfig` when the protocol version is empty or no
    /// supported versions are advertised.
    pub fn build(self) -> Result<RealtimeClient> {
        // ---
        let mut config = self.config.unwrap_or_default();
        if let Some(id) = self.client_id {
            config.client_id = id;
        }

        if config.protocol_version.is_empty() {
            return Err(RpcError::MissingConfig("protocol_version".into()));
        }
        if config.supported_versions.is_empty() {
            return Err(RpcError::MissingConfig("supported_versions".into()));
        }

        let sequence = self.sequence.unwrap_or_default();

        Ok(RealtimeClient::new(self.transport, sequence, config))
    }
}
