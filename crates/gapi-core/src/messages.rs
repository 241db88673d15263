//! Plain JSON control messages exchanged outside the binary envelope.

use serde::Serialize;
use serde_json::Value;

/// Outbound control requests, tagged by `apiServiceName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "apiServiceName")]
pub enum ControlRequest {
    /// Sent once per established connection.
    #[serde(rename = "microServiceHello")]
    Hello {
        #[serde(rename = "microServiceKey")]
        guid: String,
    },

    /// Keepalive ping.
    #[serde(rename = "ping")]
    Ping,
}

impl ControlRequest {
    pub fn hello(guid: impl Into<String>) -> Self {
        Self::Hello { guid: guid.into() }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Classification of an inbound text message.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// `{"status":"error","errorDescription":...}`
    ServerError { description: Option<String> },
    /// Any object with a truthy `microServiceHelloResponse`.
    HelloAck,
    /// Valid JSON without a recognized shape.
    Unrecognized(Value),
}

impl ControlMessage {
    /// Parse inbound text. The error shape is checked before the hello ack.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::classify(value))
    }

    pub fn classify(value: Value) -> Self {
        if value.get("status").and_then(Value::as_str) == Some("error") {
            let description = value
                .get("errorDescription")
                .map(|d| match d {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            return Self::ServerError { description };
        }

        if value.get("microServiceHelloResponse").is_some_and(is_truthy) {
            return Self::HelloAck;
        }

        Self::Unrecognized(value)
    }
}

/// Loose truthiness: null, false, zero, and empty containers are false.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
