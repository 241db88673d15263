//! WebSocket transport implementation for gapi.
//!
//! Text frames carry JSON control messages, binary frames carry envelopes.
//! Ping/pong and raw frames are absorbed here; a close frame ends the stream.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use gapi_core::error::{GapiError, GapiResult};
use gapi_core::transport::{BoxFuture, Connector, MessageSink, MessageStream, WireMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the gateway with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn connect<'a>(
        &'a self,
        url: &'a str,
    ) -> BoxFuture<'a, GapiResult<(Box<dyn MessageSink>, Box<dyn MessageStream>)>> {
        Box::pin(async move {
            super::check_scheme(url)?;
            let (ws_stream, _response) = connect_async(url)
                .await
                .map_err(|e| GapiError::Transport(format!("WebSocket connect error: {e}")))?;

            tracing::debug!(url = %url, "WebSocket connected");

            let (sink, stream) = ws_stream.split();
            Ok((
                Box::new(WebSocketSink { sink }) as Box<dyn MessageSink>,
                Box::new(WebSocketStreamHalf { stream }) as Box<dyn MessageStream>,
            ))
        })
    }
}

struct WebSocketSink {
    sink: SplitSink<WsStream, Message>,
}

impl MessageSink for WebSocketSink {
    fn send(&mut self, msg: WireMessage) -> BoxFuture<'_, GapiResult<()>> {
        Box::pin(async move {
            let frame = match msg {
                WireMessage::Text(text) => Message::Text(text),
                WireMessage::Binary(data) => Message::Binary(data),
            };
            self.sink
                .send(frame)
                .await
                .map_err(|e| GapiError::Transport(format!("WS send error: {e}")))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, GapiResult<()>> {
        Box::pin(async move {
            self.sink
                .close()
                .await
                .map_err(|e| GapiError::Transport(format!("WS close error: {e}")))
        })
    }
}

struct WebSocketStreamHalf {
    stream: SplitStream<WsStream>,
}

impl MessageStream for WebSocketStreamHalf {
    fn recv(&mut self) -> BoxFuture<'_, Option<GapiResult<WireMessage>>> {
        Box::pin(async move {
            loop {
                let msg = match self.stream.next().await {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        return Some(Err(GapiError::Transport(format!("WS read error: {e}"))));
                    }
                    None => return None,
                };
                match msg {
                    Message::Text(text) => return Some(Ok(WireMessage::Text(text))),
                    Message::Binary(data) => return Some(Ok(WireMessage::Binary(data))),
                    Message::Close(frame) => {
                        tracing::debug!(?frame, "WebSocket close frame received");
                        return None;
                    }
                    // tungstenite answers pings on its own.
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                }
            }
        })
    }
}
