//! Domain layer public interface.
//!
//! Envelope, inbound frame and transport abstractions that are independent of
//! any concrete connection.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod envelope;
mod models;
mod response;
mod transport;

pub use envelope::Envelope;

pub use models::{Channel, ObjectResponse, RoomMessage};

pub use response::{
    //
    get_field,
    get_truthy_field,
    Response,
};

pub use transport::{
    //
    PushHandler,
    Transport,
    TransportPtr,
};
