//! Business-logic boundary invoked for every decoded envelope.

use std::future::Future;

use serde_json::{json, Value};
use tracing::info;

use gapi_core::codec::Envelope;
use gapi_core::error::{GapiError, GapiResult};

use crate::connection::ConnectionHandle;

/// Processes one decoded envelope and optionally produces a reply.
///
/// The returned envelope is framed and sent by the dispatch loop. The
/// connection handle is available for handlers that need to send more than
/// one message; most never touch it.
pub trait Handler: Send + Sync + 'static {
    fn handle(
        &self,
        message: &Envelope,
        connection: &ConnectionHandle,
    ) -> impl Future<Output = GapiResult<Option<Envelope>>> + Send;
}

/// Sample handler: echoes the request object back with a `message` field
/// holding a small JSON document as a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl Handler for EchoHandler {
    async fn handle(
        &self,
        message: &Envelope,
        _connection: &ConnectionHandle,
    ) -> GapiResult<Option<Envelope>> {
        info!(json = %message.json, "inbound message");

        let mut request: Value = serde_json::from_str(&message.json)?;
        if message.has_binary() {
            info!(bytes = message.binary.len(), "request has binary payload");
        }

        let fields = request
            .as_object_mut()
            .ok_or_else(|| GapiError::Content("request is not a JSON object".into()))?;
        let custom = json!({ "field1": 10, "field2": "bacon" });
        fields.insert("message".into(), Value::String(custom.to_string()));

        Ok(Some(Envelope::json(request.to_string())))
    }
}
