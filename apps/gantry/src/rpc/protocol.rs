use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound JSON-RPC request. A present `id` makes it a call that expects a
/// reply; an absent `id` makes it a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn call(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(Value::from(id)),
            method: method.into(),
            params: normalize_params(params),
        }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params: normalize_params(params),
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

// Moonraker expects a params object on every request; null would be rejected.
fn normalize_params(params: Value) -> Value {
    match params {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    }
}

/// Inbound reply to one of our calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    pub id: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ServerError>,
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A server-initiated request pushed outside any call/response cycle.
/// Moonraker sends these with positional params and no id.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingNotification {
    pub method: String,
    pub params: Vec<Value>,
}

/// One decoded inbound frame.
///
/// The wire format is not tagged: a frame with a `method` member is a
/// notification, otherwise a frame with an `id` is a response. Anything else
/// is malformed and reported as such so the read pump can drop it without
/// dying.
#[derive(Debug)]
pub enum InboundFrame {
    Response(RpcResponse),
    Notification(IncomingNotification),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has neither method nor id")]
    Unclassifiable,
}

impl InboundFrame {
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;

        if let Some(method) = value.get("method").and_then(Value::as_str) {
            let params = match value.get("params") {
                Some(Value::Array(items)) => items.clone(),
                // Tolerate an object or scalar by wrapping it.
                Some(Value::Null) | None => Vec::new(),
                Some(other) => vec![other.clone()],
            };
            return Ok(Self::Notification(IncomingNotification {
                method: method.to_string(),
                params,
            }));
        }

        if value.get("id").is_some_and(|id| !id.is_null()) {
            let response: RpcResponse = serde_json::from_value(value)?;
            return Ok(Self::Response(response));
        }

        Err(FrameError::Unclassifiable)
    }
}

/// Extract our numeric call id from a response's echoed `id`, tolerating
/// servers that echo numbers back as strings.
pub fn response_call_id(id: &Value) -> Option<u64> {
    match id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_serializes_with_id_and_version() {
        let req = RpcRequest::call("printer.info", Value::Null, 7);
        let encoded = serde_json::to_value(&req).unwrap();
        assert_eq!(encoded["jsonrpc"], "2.0");
        assert_eq!(encoded["id"], 7);
        assert_eq!(encoded["method"], "printer.info");
        assert!(encoded["params"].is_object());
    }

    #[test]
    fn notification_serializes_without_id() {
        let req = RpcRequest::notification("server.connection.identify", json!({}));
        let encoded = serde_json::to_value(&req).unwrap();
        assert!(encoded.get("id").is_none());
    }

    #[test]
    fn frame_with_method_is_a_notification() {
        let frame = InboundFrame::decode(
            r#"{"jsonrpc":"2.0","method":"notify_gcode_response","params":["ok"]}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::Notification(n) => {
                assert_eq!(n.method, "notify_gcode_response");
                assert_eq!(n.params, vec![json!("ok")]);
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn frame_with_id_is_a_response() {
        let frame =
            InboundFrame::decode(r#"{"jsonrpc":"2.0","id":3,"result":{"state":"ready"}}"#).unwrap();
        match frame {
            InboundFrame::Response(r) => {
                assert_eq!(response_call_id(&r.id), Some(3));
                assert_eq!(r.result.unwrap()["state"], "ready");
                assert!(r.error.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn error_response_decodes_typed() {
        let frame = InboundFrame::decode(
            r#"{"id":"9","error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::Response(r) => {
                assert_eq!(response_call_id(&r.id), Some(9));
                let err = r.error.unwrap();
                assert_eq!(err.code, -32601);
                assert_eq!(err.message, "Method not found");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn notification_object_params_are_wrapped() {
        let frame = InboundFrame::decode(
            r#"{"method":"notify_status_update","params":{"print_stats":{}}}"#,
        )
        .unwrap();
        match frame {
            InboundFrame::Notification(n) => assert_eq!(n.params.len(), 1),
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn malformed_frames_are_rejected_not_fatal() {
        assert!(InboundFrame::decode("not json").is_err());
        assert!(InboundFrame::decode(r#"{"jsonrpc":"2.0"}"#).is_err());
        assert!(InboundFrame::decode(r#"{"id":null,"result":1}"#).is_err());
    }
}
