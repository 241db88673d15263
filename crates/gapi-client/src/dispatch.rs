//! Single consumer of the inbound queue.
//!
//! Units are processed strictly in arrival order. Binary units are decoded
//! as envelopes and handed to the `Handler`; text units are parsed as JSON
//! control messages. Nothing that goes wrong with one unit stops the loop,
//! a panicking handler included. Shutdown abandons the unit in progress and
//! leaves whatever is still queued.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::{error, info, trace, warn, Instrument, Span};

use gapi_core::codec::Envelope;
use gapi_core::messages::ControlMessage;
use gapi_core::transport::WireMessage;

use crate::connection::{ConnectionHandle, InboundReceiver};
use crate::handler::Handler;
use crate::shutdown::ShutdownListener;

/// Longest JSON excerpt written to the log.
const SNIPPET_LEN: usize = 256;

/// What happened to one dequeued unit. Every unit yields exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handler produced a reply and it was sent.
    Replied,
    /// Handler ran and had nothing to send.
    NoReply,
    HelloAck,
    ServerError,
    /// Text that is not JSON or has no known control shape.
    Unrecognized,
    /// Binary unit that is not a valid envelope.
    FramingFailed,
    HandlerFailed,
    /// Reply could not be sent on the current connection.
    ReplyFailed,
}

pub struct Dispatcher<H> {
    handler: H,
    connection: ConnectionHandle,
    shutdown: ShutdownListener,
    span: Span,
}

impl<H: Handler> Dispatcher<H> {
    pub fn new(
        handler: H,
        connection: ConnectionHandle,
        shutdown: ShutdownListener,
        span: Span,
    ) -> Self {
        Self {
            handler,
            connection,
            shutdown,
            span,
        }
    }

    /// Consume the queue until shutdown or until every sender is gone.
    pub async fn run(self, mut inbound: InboundReceiver) {
        let span = self.span.clone();
        let mut shutdown = self.shutdown.clone();
        async move {
            loop {
                let unit = tokio::select! {
                    biased;
                    _ = shutdown.wait() => {
                        info!("shutdown requested, dispatch loop stopped");
                        return;
                    }
                    unit = inbound.recv() => match unit {
                        Some(unit) => unit,
                        None => break,
                    },
                };

                // Handlers and reply sends may hang on a dead peer.
                tokio::select! {
                    biased;
                    outcome = self.process(unit) => trace!(?outcome, "unit consumed"),
                    _ = shutdown.wait() => {
                        warn!("shutdown requested, abandoning unit in progress");
                        return;
                    }
                }
            }
            info!("inbound queue closed, dispatch loop stopped");
        }
        .instrument(span)
        .await
    }

    pub async fn process(&self, unit: WireMessage) -> Outcome {
        match unit {
            WireMessage::Binary(data) => self.process_binary(&data).await,
            WireMessage::Text(text) => process_text(&text),
        }
    }

    async fn process_binary(&self, data: &[u8]) -> Outcome {
        let envelope = match Envelope::decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(bytes = data.len(), error = %e, "dropping undecodable envelope");
                return Outcome::FramingFailed;
            }
        };

        let handled = AssertUnwindSafe(self.handler.handle(&envelope, &self.connection))
            .catch_unwind()
            .await;
        let reply = match handled {
            Ok(Ok(Some(reply))) => reply,
            Ok(Ok(None)) => return Outcome::NoReply,
            Ok(Err(e)) => {
                error!(
                    error = %e,
                    json = snippet(&envelope.json),
                    bytes = envelope.binary.len(),
                    "handler failed"
                );
                return Outcome::HandlerFailed;
            }
            Err(_) => {
                error!(
                    json = snippet(&envelope.json),
                    bytes = envelope.binary.len(),
                    "handler panicked"
                );
                return Outcome::HandlerFailed;
            }
        };

        match self.connection.send_envelope(&reply).await {
            Ok(()) => {
                info!(json = snippet(&reply.json), "response sent");
                Outcome::Replied
            }
            Err(e) => {
                error!(error = %e, json = snippet(&reply.json), "failed to send response");
                Outcome::ReplyFailed
            }
        }
    }
}

fn process_text(text: &str) -> Outcome {
    info!(text = snippet(text), "control message");

    match ControlMessage::parse(text) {
        Ok(ControlMessage::ServerError { description }) => {
            warn!(
                description = description.as_deref().unwrap_or("<none>"),
                "server side error"
            );
            Outcome::ServerError
        }
        Ok(ControlMessage::HelloAck) => {
            info!("got hello ack");
            Outcome::HelloAck
        }
        Ok(ControlMessage::Unrecognized(_)) => {
            info!(text = snippet(text), "ignoring unrecognized control message");
            Outcome::Unrecognized
        }
        Err(e) => {
            warn!(error = %e, text = snippet(text), "dropping non-JSON text message");
            Outcome::Unrecognized
        }
    }
}

/// Prefix of `s` at most `SNIPPET_LEN` bytes long, cut on a char boundary.
fn snippet(s: &str) -> &str {
    if s.len() <= SNIPPET_LEN {
        return s;
    }
    let mut end = SNIPPET_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
