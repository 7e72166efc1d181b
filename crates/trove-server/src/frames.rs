//! Frames pushed through a stream session's sink.

use axum::response::sse::Event;
use serde_json::json;

use trove_core::SessionId;
use trove_rpc::RpcResponse;

/// One outbound SSE frame.
#[derive(Clone, Debug)]
pub enum SessionFrame {
    /// First frame on a new stream; carries the session id the client
    /// must quote on the message path.
    Connected { session_id: SessionId },
    /// An asynchronously dispatched response envelope.
    ToolResponse(RpcResponse),
    /// Periodic liveness frame.
    Heartbeat { timestamp: String },
}

impl SessionFrame {
    pub fn connected(session_id: &SessionId) -> Self {
        Self::Connected {
            session_id: session_id.clone(),
        }
    }

    pub fn heartbeat() -> Self {
        Self::Heartbeat {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }

    /// The SSE event name on the wire.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::ToolResponse(_) => "tool-response",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }

    /// The JSON payload carried on the `data:` line.
    pub fn payload_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Connected { session_id } => {
                serde_json::to_string(&json!({ "sessionId": session_id }))
            }
            Self::ToolResponse(response) => serde_json::to_string(response),
            Self::Heartbeat { timestamp } => {
                serde_json::to_string(&json!({ "timestamp": timestamp }))
            }
        }
    }

    /// Convert into an axum SSE event.
    pub fn into_event(self) -> Event {
        let event = Event::default().event(self.event_name());
        match self.payload_json() {
            Ok(payload) => event.data(payload),
            // Unreachable for the payloads above; keep the stream alive
            // rather than dropping the connection.
            Err(_) => event.comment("payload serialization failed"),
        }
    }
}
