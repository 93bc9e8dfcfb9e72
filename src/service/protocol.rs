//! Control-socket and overlay wire types
//!
//! One newline-free JSON object per direction. The response `id` always
//! echoes the request `id`; a mismatch is a protocol error on the client
//! side.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One client request over the control socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    pub timestamp: i64,
}

/// The service's answer to one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<HashMap<String, String>>,
}

impl Response {
    pub fn ok(id: &str, data: HashMap<String, String>) -> Self {
        Self {
            id: id.to_string(),
            success: true,
            error: None,
            data: Some(data),
        }
    }

    pub fn err(id: &str, error: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            success: false,
            error: Some(error.into()),
            data: None,
        }
    }

    /// Convenience constructor for the common `{state: ...}` payload.
    pub fn state(id: &str, state: crate::domain::models::ServiceState) -> Self {
        let mut data = HashMap::new();
        data.insert("state".to_string(), state.to_string());
        Self::ok(id, data)
    }
}

/// Messages from the service to the overlay peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverlayOutbound {
    Update { text: String, stable_len: usize },
    Show,
    Hide,
}

/// Messages from the overlay peer to the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OverlayInbound {
    Confirm,
    Cancel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ServiceState;

    #[test]
    fn test_request_round_trip() {
        let raw = r#"{"id":"abc","action":"start","timestamp":1700000000}"#;
        let request: Request = serde_json::from_str(raw).unwrap();
        assert_eq!(request.id, "abc");
        assert_eq!(request.action, "start");
        assert_eq!(request.args, None);

        let with_args = r#"{"id":"x","action":"status","args":["verbose"],"timestamp":1}"#;
        let request: Request = serde_json::from_str(with_args).unwrap();
        assert_eq!(request.args.unwrap(), vec!["verbose"]);
    }

    #[test]
    fn test_response_echoes_id() {
        let response = Response::state("req-7", ServiceState::Recording);
        assert_eq!(response.id, "req-7");
        assert!(response.success);
        assert_eq!(response.data.unwrap()["state"], "recording");

        let failure = Response::err("req-8", "invalid command");
        assert_eq!(failure.id, "req-8");
        assert!(!failure.success);
        assert_eq!(failure.error.as_deref(), Some("invalid command"));
    }

    #[test]
    fn test_error_field_absent_on_success() {
        let response = Response::state("a", ServiceState::Idle);
        let encoded = serde_json::to_string(&response).unwrap();
        assert!(!encoded.contains("error"));
    }

    #[test]
    fn test_overlay_message_shapes() {
        let update = serde_json::to_string(&OverlayOutbound::Update {
            text: "the quick".to_string(),
            stable_len: 4,
        })
        .unwrap();
        assert_eq!(update, r#"{"type":"update","text":"the quick","stable_len":4}"#);

        assert_eq!(
            serde_json::to_string(&OverlayOutbound::Show).unwrap(),
            r#"{"type":"show"}"#
        );

        let confirm: OverlayInbound = serde_json::from_str(r#"{"type":"confirm"}"#).unwrap();
        assert_eq!(confirm, OverlayInbound::Confirm);
    }
}
