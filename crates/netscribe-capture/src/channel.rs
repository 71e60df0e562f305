//! Typed page channel between the interceptor and the relay.
//!
//! Envelopes carry the sender's window identity and the raw message data,
//! exactly what a page-wide broadcast would deliver. Receivers validate the
//! sender and decode the data into [`PageMessage`] before acting on it.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::types::{HeaderMap, LogLevel, QueryMap};

/// Source tag of console messages.
pub const CONSOLE_SOURCE: &str = "logger-extension";
/// Source tag of network messages.
pub const NETWORK_SOURCE: &str = "logger-extension-network";

const CHANNEL_CAPACITY: usize = 512;

static NEXT_WINDOW: AtomicU64 = AtomicU64::new(1);

/// Identity of the window (frame) a message was posted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(u64);

impl WindowId {
    /// Allocate a fresh window identity.
    pub fn next() -> Self {
        Self(NEXT_WINDOW.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// A console call relayed out of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    #[serde(rename = "type")]
    pub level: LogLevel,
    pub payload: String,
    pub timestamp: String,
    pub url: String,
}

/// A request observed inside the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMessage {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub query_string: QueryMap,
    #[serde(default)]
    pub request_headers: HeaderMap,
    #[serde(default)]
    pub request_body: Option<String>,
    #[serde(default)]
    pub response_headers: HeaderMap,
    #[serde(default)]
    pub response_body: Option<String>,
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

/// Every message the relay accepts, discriminated by `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source")]
pub enum PageMessage {
    #[serde(rename = "logger-extension")]
    Console(ConsoleMessage),
    #[serde(rename = "logger-extension-network")]
    Network(NetworkMessage),
}

/// Why an envelope was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "camelCase")]
pub enum ChannelError {
    #[error("message posted from another window ({0})")]
    ForeignSender(String),

    #[error("unknown message source: {0}")]
    UnknownSource(String),

    #[error("malformed message: {0}")]
    Malformed(String),
}

impl PageMessage {
    /// Validate raw message data against the two known shapes.
    pub fn from_value(data: &Value) -> Result<Self, ChannelError> {
        let source = data
            .get("source")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::UnknownSource("<missing>".into()))?;
        if source != CONSOLE_SOURCE && source != NETWORK_SOURCE {
            return Err(ChannelError::UnknownSource(source.to_string()));
        }
        serde_json::from_value(data.clone()).map_err(|e| ChannelError::Malformed(e.to_string()))
    }

    pub fn to_value(&self) -> Value {
        // Both variants are plain structs of strings, numbers and maps.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// What travels over the page channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub sender: WindowId,
    pub data: Value,
}

impl Envelope {
    /// Decode the data, accepting only messages from `own` window.
    pub fn open(&self, own: WindowId) -> Result<PageMessage, ChannelError> {
        if self.sender != own {
            return Err(ChannelError::ForeignSender(self.sender.to_string()));
        }
        PageMessage::from_value(&self.data)
    }
}

/// Broadcast channel scoped to one page.
#[derive(Debug, Clone)]
pub struct PageChannel {
    tx: broadcast::Sender<Envelope>,
}

impl PageChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Post a typed message from `sender`.
    pub fn post(&self, sender: WindowId, message: &PageMessage) {
        self.post_raw(sender, message.to_value());
    }

    /// Post arbitrary data, as any script on the page could.
    pub fn post_raw(&self, sender: WindowId, data: Value) {
        // Nobody listening means nothing is relaying this page.
        let _ = self.tx.send(Envelope { sender, data });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }
}

impl Default for PageChannel {
    fn default() -> Self {
        Self::new()
    }
}
