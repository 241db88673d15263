//! Connection lifecycle for the gateway session.
//!
//! `ConnectionManager` runs the connect -> hello -> receive cycle, reconnects
//! after any loss using its `RetryPolicy`, and pings the gateway while a
//! connection is established. Every unit received is pushed, untouched, onto
//! the inbound queue for the dispatch loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn, Instrument, Span};

use gapi_core::codec::Envelope;
use gapi_core::error::{GapiError, GapiResult};
use gapi_core::messages::ControlRequest;
use gapi_core::transport::{Connector, MessageSink, MessageStream, WireMessage};

use crate::retry::{ConstantDelay, RetryPolicy, DEFAULT_RECONNECT_DELAY};
use crate::shutdown::ShutdownListener;

/// Default interval between keepalive pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on closing a transport that has stopped responding.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sender half of the inbound queue.
pub type InboundSender = mpsc::UnboundedSender<WireMessage>;

/// Receiver half of the inbound queue.
pub type InboundReceiver = mpsc::UnboundedReceiver<WireMessage>;

/// Settings consumed by the connection manager at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Gateway URL (`ws://` or `wss://`).
    pub url: String,
    /// Client identifier presented in the hello message.
    pub guid: String,
    /// Wait between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            guid: guid.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }
}

/// Lifecycle state of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Established,
    /// Terminal. Reached once shutdown is requested.
    Stopped,
}

type SharedSink = Arc<Mutex<Box<dyn MessageSink>>>;

/// Send capability bound to whichever transport is currently established.
///
/// Cloned freely; never owns or closes the connection.
#[derive(Clone, Default)]
pub struct ConnectionHandle {
    active: Arc<Mutex<Option<SharedSink>>>,
}

impl ConnectionHandle {
    /// Send one unit on the active transport.
    pub async fn send(&self, msg: WireMessage) -> GapiResult<()> {
        let sink = self
            .active
            .lock()
            .await
            .clone()
            .ok_or(GapiError::NotConnected)?;
        let mut sink = sink.lock().await;
        sink.send(msg).await
    }

    /// Frame an envelope and send it as a binary message.
    pub async fn send_envelope(&self, envelope: &Envelope) -> GapiResult<()> {
        let frame = envelope.encode()?;
        self.send(WireMessage::Binary(frame)).await
    }

    pub async fn is_connected(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub(crate) async fn attach(&self, sink: SharedSink) {
        *self.active.lock().await = Some(sink);
    }

    pub(crate) async fn detach(&self) -> Option<SharedSink> {
        self.active.lock().await.take()
    }
}

/// How one connection ended.
enum SessionEnd {
    /// Shutdown was requested, or nobody is left to consume messages.
    Stopped,
    /// Transport failure or peer close; reconnect after the retry delay.
    Lost(GapiError),
}

/// Owns the gateway transport and drives its lifecycle.
pub struct ConnectionManager {
    config: ConnectionConfig,
    connector: Box<dyn Connector>,
    retry: Box<dyn RetryPolicy>,
    inbound: InboundSender,
    handle: ConnectionHandle,
    state: watch::Sender<ConnectionState>,
    shutdown: ShutdownListener,
    span: Span,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        connector: impl Connector + 'static,
        inbound: InboundSender,
        shutdown: ShutdownListener,
        span: Span,
    ) -> Self {
        let retry = Box::new(ConstantDelay::new(config.reconnect_delay));
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            connector: Box::new(connector),
            retry,
            inbound,
            handle: ConnectionHandle::default(),
            state,
            shutdown,
            span,
        }
    }

    /// Replace the default constant-delay policy.
    pub fn with_retry_policy(mut self, policy: Box<dyn RetryPolicy>) -> Self {
        self.retry = policy;
        self
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Run until shutdown. Dropping the manager afterwards closes the inbound queue.
    pub async fn run(mut self) {
        let span = self.span.clone();
        async move {
            loop {
                if self.shutdown.is_triggered() {
                    break;
                }

                match self.connect_once().await {
                    SessionEnd::Stopped => break,
                    SessionEnd::Lost(e) => {
                        error!(error = %e, "connection failed");
                    }
                }

                self.set_state(ConnectionState::Disconnected);
                let delay = self.retry.next_delay();
                debug!(delay_ms = delay.as_millis() as u64, "waiting before reconnect");
                tokio::select! {
                    _ = self.shutdown.wait() => break,
                    _ = time::sleep(delay) => {}
                }
            }

            self.set_state(ConnectionState::Stopped);
            info!("connection manager stopped");
        }
        .instrument(span)
        .await
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = ?prev, to = ?next, "connection state");
        }
    }

    /// One full connection: connect, hello, receive until lost or stopped.
    async fn connect_once(&mut self) -> SessionEnd {
        self.set_state(ConnectionState::Connecting);
        info!(url = %self.config.url, guid = %self.config.guid, "connecting");

        let connected = tokio::select! {
            _ = self.shutdown.wait() => return SessionEnd::Stopped,
            result = self.connector.connect(&self.config.url) => result,
        };
        let (sink, stream) = match connected {
            Ok(halves) => halves,
            Err(e) => return SessionEnd::Lost(e),
        };
        let sink: SharedSink = Arc::new(Mutex::new(sink));

        self.set_state(ConnectionState::Handshaking);
        let hello = ControlRequest::hello(&self.config.guid);
        let sent = tokio::select! {
            _ = self.shutdown.wait() => None,
            result = send_control(&sink, &hello) => Some(result),
        };
        match sent {
            Some(Ok(())) => info!(guid = %self.config.guid, "connected, hello sent"),
            Some(Err(e)) => {
                close_transport(&sink).await;
                return SessionEnd::Lost(e);
            }
            None => {
                close_transport(&sink).await;
                return SessionEnd::Stopped;
            }
        }

        self.handle.attach(sink.clone()).await;
        self.retry.reset();
        self.set_state(ConnectionState::Established);

        let end = self.receive_loop(&sink, stream).await;

        self.handle.detach().await;
        close_transport(&sink).await;
        end
    }

    /// The established state. The keepalive ticker lives and dies with this scope.
    async fn receive_loop(
        &mut self,
        sink: &SharedSink,
        mut stream: Box<dyn MessageStream>,
    ) -> SessionEnd {
        // tokio intervals panic on a zero period.
        let period = self.config.keepalive_interval.max(Duration::from_millis(1));
        let mut keepalive = time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.wait() => return SessionEnd::Stopped,

                _ = keepalive.tick() => {
                    // A stalled send must not hide a shutdown request.
                    let sent = tokio::select! {
                        _ = self.shutdown.wait() => return SessionEnd::Stopped,
                        result = send_control(sink, &ControlRequest::Ping) => result,
                    };
                    if let Err(e) = sent {
                        return SessionEnd::Lost(e);
                    }
                    debug!("keepalive ping sent");
                }

                received = stream.recv() => match received {
                    Some(Ok(msg)) => {
                        debug!(kind = msg.kind(), bytes = msg.len(), "received");
                        if self.inbound.send(msg).is_err() {
                            warn!("inbound queue closed, stopping");
                            return SessionEnd::Stopped;
                        }
                    }
                    Some(Err(e)) => return SessionEnd::Lost(e),
                    None => {
                        return SessionEnd::Lost(GapiError::Transport(
                            "connection closed by peer".into(),
                        ))
                    }
                },
            }
        }
    }
}

async fn send_control(sink: &SharedSink, request: &ControlRequest) -> GapiResult<()> {
    let text = request.to_json()?;
    let mut sink = sink.lock().await;
    sink.send(WireMessage::Text(text)).await
}

/// Close a transport, waiting at most `CLOSE_TIMEOUT` for the lock and the close.
async fn close_transport(sink: &SharedSink) {
    let close = async {
        let mut sink = sink.lock().await;
        sink.close().await
    };
    match time::timeout(CLOSE_TIMEOUT, close).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "closing transport"),
        Err(_) => warn!("transport close timed out"),
    }
}
