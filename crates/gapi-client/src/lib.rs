//! gapi-client: persistent client for the gapi microservice gateway.
//!
//! Keeps one WebSocket connection to the gateway alive (hello on connect,
//! periodic ping, reconnect on loss) and processes received messages on a
//! separate dispatch loop, in arrival order, so slow handlers never stall
//! the read side.
//!
//! # Quick Start
//!
//! ```no_run
//! use gapi_client::{ConnectionConfig, EchoHandler, GapiClient, WebSocketConnector};
//!
//! # async fn example() -> Result<(), tokio::task::JoinError> {
//! let client = GapiClient::new(
//!     ConnectionConfig::new("wss://gateway.example.com/ms", "my-guid"),
//!     WebSocketConnector::new(),
//!     EchoHandler,
//! )
//! .spawn();
//!
//! tokio::signal::ctrl_c().await.ok();
//! client.shutdown();
//! client.join().await
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod dispatch;
pub mod handler;
pub mod retry;
pub mod shutdown;
pub mod transport;

#[cfg(test)]
mod mock;

// Re-export primary public types.
pub use client::{GapiClient, RunningClient};
pub use connection::{ConnectionConfig, ConnectionHandle, ConnectionManager, ConnectionState};
pub use dispatch::{Dispatcher, Outcome};
pub use handler::{EchoHandler, Handler};
pub use retry::{ConstantDelay, ExponentialBackoff, RetryPolicy};
pub use shutdown::{Shutdown, ShutdownListener};
pub use transport::WebSocketConnector;

// Re-export gapi-core types for convenience.
pub use gapi_core::{Envelope, GapiError, GapiResult, WireMessage};
