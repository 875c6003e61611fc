//! Client-side request/response correlation for the Rocket.Chat realtime API.
//!
//! This library builds the DDP envelopes for the realtime operations a chat
//! client needs (handshake, login, rooms, messages, reactions, typing and
//! room/message subscriptions), correlates every reply with its call through
//! a sequence of ids, and turns server-pushed frames into typed events.
//!
//! Opening the socket, reconnecting and heartbeats belong to whoever
//! implements [`Transport`]. The crate ships an in-memory transport for tests.
//!
//! # Example
//!
//! ```no_run
//! use rocketchat_realtime::{create_memory_transport, RealtimeClientBuilder};
//!
//! # async fn example() -> rocketchat_realtime::Result<()> {
//! let (transport, _peer) = create_memory_transport().await?;
//! let client = RealtimeClientBuilder::new(transport).build()?;
//!
//! client.connect().await?;
//! client.login("bot", "secret").await?;
//!
//! for channel in client.get_channels().await? {
//!     client
//!         .subscribe_to_channel_messages(&channel.id, |message| {
//!             println!("{}: {}", message.sender_id, message.text);
//!         })
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

// Import all sub modules once...
mod macros;
pub(crate) use macros::{log_debug, log_error, log_info, log_trace, log_warn};

mod client;
mod client_builder;
mod domain;
mod methods;
mod transport;

mod rpc_config;

mod correlation;
mod error;

// Re-export main types
pub use client::RealtimeClient;
pub use client_builder::RealtimeClientBuilder;

pub use rpc_config::RealtimeConfig;

pub use correlation::{CorrelationId, SequenceAllocator};
pub use error::{Operation, Result, RpcError, ServerError};

pub use transport::{create_memory_transport, Dispatcher, MemoryPeer, MemoryTransport};

// --- public re-exports
pub use domain::{
    //
    get_field,
    get_truthy_field,
    Channel,
    Envelope,
    ObjectResponse,
    PushHandler,
    Response,
    RoomMessage,
    Transport,
    TransportPtr,
};

pub use methods::{
    //
    message_id,
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
