//! Abstract transport traits for the gapi client.
//!
//! The WebSocket implementation lives in `gapi-client`; tests substitute
//! in-memory connectors. Methods return boxed futures so the traits stay
//! object-safe and the connection manager can hold `Box<dyn ...>` handles.

use crate::error::GapiResult;
use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One unit received from or sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// Plain JSON control text.
    Text(String),
    /// A binary envelope (or anything else the peer sent as binary).
    Binary(Vec<u8>),
}

impl WireMessage {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(t) => t.len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }
}

/// Sending half of an established transport.
pub trait MessageSink: Send {
    fn send(&mut self, msg: WireMessage) -> BoxFuture<'_, GapiResult<()>>;

    /// Close the transport. Unblocks the matching stream's pending receive.
    fn close(&mut self) -> BoxFuture<'_, GapiResult<()>>;
}

/// Receiving half of an established transport.
pub trait MessageStream: Send {
    /// Next inbound unit. `None` means the peer closed the connection.
    fn recv(&mut self) -> BoxFuture<'_, Option<GapiResult<WireMessage>>>;
}

/// Opens a fresh transport to the gateway on every call.
pub trait Connector: Send + Sync {
    fn connect<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, GapiResult<(Box<dyn MessageSink>, Box<dyn MessageStream>)>>;
}
