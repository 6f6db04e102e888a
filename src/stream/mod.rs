//! Network side of the pipeline: wire format, transport and connection liveness.
//!
//! One JSON text message per emitted pose goes out over a persistent
//! WebSocket to the remote controller. No authentication, compression,
//! acknowledgement or sequence numbering.

mod channel;
mod error;
pub mod message;
mod transport;

pub use channel::{ConnectionState, DEFAULT_CLOSE_REASON, StreamAddress, StreamChannel};
pub use error::StreamError;
pub use message::PoseMessage;
pub use transport::{Connector, Interrupt, Transport, WebSocketConnector};
