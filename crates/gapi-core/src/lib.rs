//! gapi-core: Shared protocol library for the gapi microservice client.
//!
//! Provides the binary envelope codec, JSON control message shapes, the
//! error taxonomy, and abstract transport traits. No I/O happens here.

pub mod codec;
pub mod error;
pub mod messages;
pub mod transport;

// Re-export commonly used items at crate root.
pub use codec::{frame_decode, frame_encode, Envelope, MAGIC};
pub use error::{FramingError, GapiError, GapiResult};
pub use messages::{ControlMessage, ControlRequest};
pub use transport::{BoxFuture, Connector, MessageSink, MessageStream, WireMessage};
