//! Client session for the realtime API.

mod realtime_client;

pub use realtime_client::RealtimeClient;
