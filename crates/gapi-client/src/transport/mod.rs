//! Transport implementations for the gapi client.
//!
//! Only WebSocket is supported; the URL scheme must be `ws://` or `wss://`.

pub mod websocket;

pub use websocket::WebSocketConnector;

use gapi_core::error::{GapiError, GapiResult};

/// Reject URLs the WebSocket transport cannot dial.
pub fn check_scheme(url: &str) -> GapiResult<()> {
    let lower = url.to_lowercase();
    if lower.starts_with("ws://") || lower.starts_with("wss://") {
        Ok(())
    } else {
        Err(GapiError::Transport(format!(
            "unsupported URL scheme: {url} (expected ws:// or wss://)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_websocket_schemes() {
        assert!(check_scheme("ws://localhost:8080").is_ok());
        assert!(check_scheme("wss://gateway.example.com/ms").is_ok());
        assert!(check_scheme("WSS://GATEWAY.EXAMPLE.COM").is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(check_scheme("http://example.com").is_err());
        assert!(check_scheme("https://example.com").is_err());
        assert!(check_scheme("example.com:8080").is_err());
    }
}
