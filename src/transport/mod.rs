//! Transport implementations.
//!
//! This module provides the frame router every transport needs and the
//! in-memory reference implementation of the domain-level `Transport` trait.
//! Network transports live outside this crate and reuse [`Dispatcher`].
//!
//! Domain code must not depend on transport-specific types.

mod dispatch;
mod memory;

pub use dispatch::Dispatcher;

pub use memory::{create_transport as create_memory_transport, MemoryPeer, MemoryTransport};
