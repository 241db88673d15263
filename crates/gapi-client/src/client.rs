//! The gapi client.
//!
//! `GapiClient` wires the connection manager and the dispatch loop together
//! over one inbound queue and runs both as tokio tasks.

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tracing::info_span;

use gapi_core::transport::Connector;

use crate::connection::{ConnectionConfig, ConnectionManager, ConnectionState};
use crate::dispatch::Dispatcher;
use crate::handler::Handler;
use crate::retry::RetryPolicy;
use crate::shutdown::Shutdown;

/// A configured, not yet running client.
pub struct GapiClient<C, H> {
    config: ConnectionConfig,
    connector: C,
    handler: H,
    retry: Option<Box<dyn RetryPolicy>>,
}

impl<C: Connector + 'static, H: Handler> GapiClient<C, H> {
    pub fn new(config: ConnectionConfig, connector: C, handler: H) -> Self {
        Self {
            config,
            connector,
            handler,
            retry: None,
        }
    }

    /// Use `policy` instead of a constant `reconnect_delay`.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry = Some(Box::new(policy));
        self
    }

    /// Start the connection manager and the dispatch loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> RunningClient {
        let (shutdown, listener) = Shutdown::new();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let connection_span = info_span!(
            "connection",
            url = %self.config.url,
            guid = %self.config.guid
        );
        let mut manager = ConnectionManager::new(
            self.config,
            self.connector,
            inbound_tx,
            listener,
            connection_span,
        );
        if let Some(policy) = self.retry {
            manager = manager.with_retry_policy(policy);
        }

        let state = manager.state();
        let dispatcher = Dispatcher::new(
            self.handler,
            manager.handle(),
            shutdown.subscribe(),
            info_span!("dispatch"),
        );

        let manager_task = tokio::spawn(manager.run());
        let dispatch_task = tokio::spawn(dispatcher.run(inbound_rx));

        RunningClient {
            shutdown,
            state,
            manager_task,
            dispatch_task,
        }
    }
}

/// Handles to a running client.
pub struct RunningClient {
    shutdown: Shutdown,
    state: watch::Receiver<ConnectionState>,
    manager_task: JoinHandle<()>,
    dispatch_task: JoinHandle<()>,
}

impl RunningClient {
    /// Request shutdown. Safe to call more than once.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait for both tasks to stop.
    pub async fn join(self) -> Result<(), JoinError> {
        self.manager_task.await?;
        self.dispatch_task.await
    }
}
