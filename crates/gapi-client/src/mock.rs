//! In-memory transport used by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::Instant;

use gapi_core::error::{GapiError, GapiResult};
use gapi_core::transport::{BoxFuture, Connector, MessageSink, MessageStream, WireMessage};

/// Switches the gateway side flips to misbehave.
#[derive(Default)]
struct Faults {
    fail_sends: AtomicBool,
    stall_sends: AtomicBool,
    stall_close: AtomicBool,
    closed: AtomicBool,
}

pub(crate) struct MockSink {
    sent: mpsc::UnboundedSender<WireMessage>,
    faults: Arc<Faults>,
}

impl MessageSink for MockSink {
    fn send(&mut self, msg: WireMessage) -> BoxFuture<'_, GapiResult<()>> {
        Box::pin(async move {
            if self.faults.stall_sends.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if self.faults.fail_sends.load(Ordering::SeqCst)
                || self.faults.closed.load(Ordering::SeqCst)
            {
                return Err(GapiError::Transport("mock send failed".into()));
            }
            self.sent
                .send(msg)
                .map_err(|_| GapiError::Transport("mock peer gone".into()))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, GapiResult<()>> {
        Box::pin(async move {
            if self.faults.stall_close.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.faults.closed.store(true, Ordering::SeqCst);
            Ok(())
        })
    }
}

pub(crate) struct MockStream {
    rx: mpsc::UnboundedReceiver<WireMessage>,
}

impl MessageStream for MockStream {
    fn recv(&mut self) -> BoxFuture<'_, Option<GapiResult<WireMessage>>> {
        Box::pin(async move { self.rx.recv().await.map(Ok) })
    }
}

/// The gateway side of a mock connection.
pub(crate) struct MockPeer {
    /// Everything the client sent, in order.
    pub sent: mpsc::UnboundedReceiver<WireMessage>,
    to_client: Option<mpsc::UnboundedSender<WireMessage>>,
    faults: Arc<Faults>,
}

impl MockPeer {
    pub fn push(&self, msg: WireMessage) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(msg);
        }
    }

    /// Close from the gateway side; the client's receive ends.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }

    /// Make every subsequent client send fail.
    pub fn fail_sends(&self) {
        self.faults.fail_sends.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent client send hang, like a peer that stopped reading.
    pub fn stall_sends(&self) {
        self.faults.stall_sends.store(true, Ordering::SeqCst);
    }

    /// Make closing the transport hang.
    pub fn stall_close(&self) {
        self.faults.stall_close.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.faults.closed.load(Ordering::SeqCst)
    }
}

pub(crate) fn mock_pair() -> (MockSink, MockStream, MockPeer) {
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let (to_client, rx) = mpsc::unbounded_channel();
    let faults = Arc::new(Faults::default());
    (
        MockSink {
            sent: sent_tx,
            faults: faults.clone(),
        },
        MockStream { rx },
        MockPeer {
            sent: sent_rx,
            to_client: Some(to_client),
            faults,
        },
    )
}

/// Hands out prepared connections in order, then refuses.
pub(crate) struct MockConnector {
    pending: Mutex<VecDeque<(MockSink, MockStream)>>,
    refuse_first: AtomicUsize,
    attempts: Arc<Mutex<Vec<Instant>>>,
}

impl MockConnector {
    pub fn new(connections: Vec<(MockSink, MockStream)>) -> Self {
        Self {
            pending: Mutex::new(connections.into()),
            refuse_first: AtomicUsize::new(0),
            attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Refuse the first `n` attempts before handing out connections.
    pub fn fail_first(self, n: usize) -> Self {
        self.refuse_first.store(n, Ordering::SeqCst);
        self
    }

    /// Times at which `connect` was called.
    pub fn attempts(&self) -> Arc<Mutex<Vec<Instant>>> {
        self.attempts.clone()
    }

    fn next(&self) -> GapiResult<(Box<dyn MessageSink>, Box<dyn MessageStream>)> {
        self.attempts.lock().unwrap().push(Instant::now());

        let refused = self
            .refuse_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(GapiError::Transport("connection refused".into()));
        }

        match self.pending.lock().unwrap().pop_front() {
            Some((sink, stream)) => Ok((Box::new(sink), Box::new(stream))),
            None => Err(GapiError::Transport("connection refused".into())),
        }
    }
}

impl Connector for MockConnector {
    fn connect<'a>(
        &'a self,
        _url: &'a str,
    ) -> BoxFuture<'a, GapiResult<(Box<dyn MessageSink>, Box<dyn MessageStream>)>> {
        let result = self.next();
        Box::pin(async move { result })
    }
}
