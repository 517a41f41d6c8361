// rmcp bindings for the notification sink and delegated computation.
//
// Request and notification params are built from their wire JSON so that
// only the field names of the protocol matter here.

use futures::future::BoxFuture;
use rmcp::model::ErrorCode;
use rmcp::service::Peer;
use rmcp::{RoleServer, ServiceError};
use serde_json::{json, Value};

use crate::delegate::{DelegatedRequest, PeerError, SamplingPeer};
use crate::notify::{DeliveryError, NotificationEvent, NotificationTransport};

/// Delivers notifications over the client connection.
pub struct PeerNotifier {
    peer: Peer<RoleServer>,
}

impl PeerNotifier {
    pub fn new(peer: Peer<RoleServer>) -> Self {
        Self { peer }
    }
}

impl NotificationTransport for PeerNotifier {
    fn deliver(&self, event: NotificationEvent) -> BoxFuture<'_, Result<(), DeliveryError>> {
        Box::pin(async move {
            match event {
                NotificationEvent::Progress {
                    token,
                    current,
                    total,
                } => {
                    let mut params = json!({ "progressToken": token, "progress": current });
                    if let Some(total) = total {
                        params["total"] = json!(total);
                    }
                    let params = serde_json::from_value(params)
                        .map_err(|e| DeliveryError::Transport(e.to_string()))?;
                    self.peer
                        .notify_progress(params)
                        .await
                        .map_err(delivery_error)
                }
                NotificationEvent::Log {
                    level,
                    message,
                    source,
                } => {
                    let params = serde_json::from_value(json!({
                        "level": level.as_str(),
                        "logger": source,
                        "data": message,
                    }))
                    .map_err(|e| DeliveryError::Transport(e.to_string()))?;
                    self.peer
                        .notify_logging_message(params)
                        .await
                        .map_err(delivery_error)
                }
            }
        })
    }
}

fn delivery_error(err: ServiceError) -> DeliveryError {
    match err {
        ServiceError::TransportClosed => DeliveryError::Closed,
        other => DeliveryError::Transport(other.to_string()),
    }
}

/// Issues `sampling/createMessage` requests to the client.
pub struct PeerSampler {
    peer: Peer<RoleServer>,
}

impl PeerSampler {
    pub fn new(peer: Peer<RoleServer>) -> Self {
        Self { peer }
    }
}

impl SamplingPeer for PeerSampler {
    fn supports_sampling(&self) -> bool {
        self.peer
            .peer_info()
            .map(|info| info.capabilities.sampling.is_some())
            .unwrap_or(false)
    }

    fn create_message<'a>(
        &'a self,
        request: &'a DelegatedRequest,
    ) -> BoxFuture<'a, Result<String, PeerError>> {
        Box::pin(async move {
            let params = serde_json::from_value(create_message_params(request))
                .map_err(|e| PeerError::UnexpectedResponse(e.to_string()))?;
            let result = self.peer.create_message(params).await.map_err(peer_error)?;
            let value = serde_json::to_value(&result)
                .map_err(|e| PeerError::UnexpectedResponse(e.to_string()))?;
            completion_text(&value).ok_or_else(|| {
                PeerError::UnexpectedResponse("completion carried no text content".to_string())
            })
        })
    }
}

fn peer_error(err: ServiceError) -> PeerError {
    match err {
        ServiceError::McpError(data) if data.code == ErrorCode::METHOD_NOT_FOUND => {
            PeerError::MethodNotFound
        }
        ServiceError::McpError(data) => PeerError::Rejected(data.message.to_string()),
        other => PeerError::Transport(other.to_string()),
    }
}

/// Wire form of a `sampling/createMessage` request.
pub(crate) fn create_message_params(request: &DelegatedRequest) -> Value {
    let mut params = json!({
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": request.prompt() },
        }],
        "maxTokens": request.max_tokens(),
        "includeContext": "none",
    });
    if let Some(system) = request.system_prompt() {
        params["systemPrompt"] = json!(system);
    }
    if let Some(temperature) = request.temperature() {
        params["temperature"] = json!(temperature);
    }
    if let Some(hint) = request.model_hint() {
        params["modelPreferences"] = json!({ "hints": [{ "name": hint }] });
    }
    params
}

/// Text of a `sampling/createMessage` result. The message may be flattened
/// into the result or nested under `message`; content may be one item or
/// a list.
pub(crate) fn completion_text(result: &Value) -> Option<String> {
    let content = result
        .get("content")
        .or_else(|| result.get("message").and_then(|m| m.get("content")))?;
    let text = match content {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        item => item.get("text").and_then(Value::as_str)?.to_string(),
    };
    Some(text)
}
