//! Capture data model and host event payloads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered header name → value map.
pub type HeaderMap = IndexMap<String, String>;

/// Ordered query parameter name → value map.
pub type QueryMap = IndexMap<String, String>;

/// Console severity levels that are captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Log,
    Warn,
    Error,
    Info,
}

impl LogLevel {
    pub fn all() -> &'static [LogLevel] {
        &[Self::Log, Self::Warn, Self::Error, Self::Info]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "LOG",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Info => "INFO",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque identifier the host assigns to one request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request buffered by the observer.
///
/// Pending until a completion or failure arrives for the same identifier;
/// terminal afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub id: RequestId,
    pub method: String,
    pub url: String,
    #[serde(rename = "requestBody")]
    pub request_body: Option<String>,
    #[serde(
        default,
        rename = "requestHeaders",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub request_headers: HeaderMap,
    #[serde(
        default,
        rename = "responseHeaders",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub response_headers: HeaderMap,
    /// `None` while pending; `Some(0)` after a transport failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Milliseconds between before-send and completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(rename = "startTime")]
    pub start_time: i64,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapturedRequest {
    pub fn is_pending(&self) -> bool {
        self.status.is_none()
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }
}

/// A console call captured in a page. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedLogLine {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub level: LogLevel,
    pub message: String,
    pub url: String,
}

/// A request captured inside a page and persisted under `networkLogs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLogEntry {
    pub timestamp: String,
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub query_string: QueryMap,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub request_headers: HeaderMap,
    #[serde(default)]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub response_headers: HeaderMap,
    #[serde(default)]
    pub response_body: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&CapturedRequest> for NetworkLogEntry {
    fn from(req: &CapturedRequest) -> Self {
        Self {
            timestamp: req.timestamp.clone(),
            method: req.method.clone(),
            url: req.url.clone(),
            query_string: QueryMap::new(),
            request_headers: req.request_headers.clone(),
            request_body: req.request_body.clone(),
            response_headers: req.response_headers.clone(),
            response_body: None,
            status: req.status,
            status_text: None,
            duration: req.duration,
            error: req.error.clone(),
        }
    }
}

// ---------------------------------------------------------------
// Request lifecycle events (host → observer)
// ---------------------------------------------------------------

/// A header as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl HttpHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Collect host headers into an ordered map. Later duplicates win.
pub fn header_map(headers: &[HttpHeader]) -> HeaderMap {
    headers
        .iter()
        .map(|h| (h.name.clone(), h.value.clone().unwrap_or_default()))
        .collect()
}

/// One chunk of a raw upload body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadData {
    #[serde(default)]
    pub bytes: Option<Vec<u8>>,
    #[serde(default)]
    pub file: Option<String>,
}

/// Request body as delivered with the before-send event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    #[serde(default)]
    pub raw: Vec<UploadData>,
    #[serde(default)]
    pub form_data: Option<IndexMap<String, Vec<String>>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Fired before a request leaves the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeforeSendEvent {
    pub request_id: RequestId,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub request_headers: Vec<HttpHeader>,
}

/// Fired when a response has been fully received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedEvent {
    pub request_id: RequestId,
    pub status_code: u16,
    #[serde(default)]
    pub response_headers: Vec<HttpHeader>,
}

/// Fired when a request fails at the transport level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEvent {
    pub request_id: RequestId,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_line_wire_shape() {
        let line = CapturedLogLine {
            timestamp: "2024-01-01T00:00:00.000Z".into(),
            level: LogLevel::Warn,
            message: "careful".into(),
            url: "https://app.local/".into(),
        };
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["type"], "WARN");
        assert_eq!(json["message"], "careful");
    }

    #[test]
    fn test_pending_request_omits_status() {
        let req = CapturedRequest {
            id: RequestId::new("7"),
            method: "GET".into(),
            url: "https://api.example.com/".into(),
            request_body: None,
            request_headers: HeaderMap::new(),
            response_headers: HeaderMap::new(),
            status: None,
            duration: None,
            start_time: 0,
            timestamp: String::new(),
            error: None,
        };
        assert!(req.is_pending());
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("status").is_none());
        assert_eq!(json["id"], "7");
    }

    #[test]
    fn test_header_map_keeps_order() {
        let map = header_map(&[
            HttpHeader::new("b", "2"),
            HttpHeader::new("a", "1"),
            HttpHeader {
                name: "empty".into(),
                value: None,
            },
        ]);
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "empty"]);
        assert_eq!(map["empty"], "");
    }

    #[test]
    fn test_before_send_event_from_json() {
        let event: BeforeSendEvent = serde_json::from_value(serde_json::json!({
            "requestId": "42",
            "method": "POST",
            "url": "https://api.example.com/items",
            "requestBody": {"formData": {"name": ["widget"]}}
        }))
        .unwrap();
        assert_eq!(event.request_id, RequestId::new("42"));
        assert!(event.request_headers.is_empty());
        let form = event.request_body.unwrap().form_data.unwrap();
        assert_eq!(form["name"], vec!["widget".to_string()]);
    }
}
