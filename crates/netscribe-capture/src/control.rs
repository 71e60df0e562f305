//! Control messages answered by the background context.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::logs;
use crate::observer::RequestObserver;
use crate::types::{CapturedLogLine, CapturedRequest};
use netscribe_core::Result;
use netscribe_store::keys;
use netscribe_store::{Storage, StorageChange};

/// A request sent to the background context, discriminated by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    GetNetworkLogs,
    ClearNetworkLogs,
    SetApiTargetUrl { url: String },
    SetConsoleTargetUrl { url: String },
    GetApiTargetUrl,
    GetConsoleTargetUrl,
    SetLoggingActive { active: bool },
    GetLoggingActive,
    GetConsoleLogs,
    ClearConsoleLogs,
}

/// Reply payloads. Serialized without a tag: `{logs}`, `{success}`, `{url}`, `{active}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    NetworkLogs { logs: Vec<CapturedRequest> },
    ConsoleLogs { logs: Vec<CapturedLogLine> },
    Success { success: bool },
    Url { url: String },
    Active { active: bool },
}

impl ControlResponse {
    fn ok() -> Self {
        Self::Success { success: true }
    }

    /// Number of log entries carried, if this is a log reply.
    pub fn log_count(&self) -> Option<usize> {
        match self {
            Self::NetworkLogs { logs } => Some(logs.len()),
            Self::ConsoleLogs { logs } => Some(logs.len()),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url { url } => Some(url),
            _ => None,
        }
    }

    pub fn active(&self) -> Option<bool> {
        match self {
            Self::Active { active } => Some(*active),
            _ => None,
        }
    }
}

/// Answers [`ControlMessage`]s against the observer buffer and storage.
#[derive(Clone)]
pub struct ControlService {
    observer: Arc<RwLock<RequestObserver>>,
    storage: Arc<dyn Storage>,
}

impl ControlService {
    pub fn new(observer: Arc<RwLock<RequestObserver>>, storage: Arc<dyn Storage>) -> Self {
        Self { observer, storage }
    }

    pub fn observer(&self) -> &Arc<RwLock<RequestObserver>> {
        &self.observer
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn handle(&self, msg: ControlMessage) -> Result<ControlResponse> {
        match msg {
            ControlMessage::GetNetworkLogs => Ok(ControlResponse::NetworkLogs {
                logs: self.observer.read().logs().to_vec(),
            }),
            ControlMessage::ClearNetworkLogs => {
                self.observer.write().clear();
                Ok(ControlResponse::ok())
            }
            ControlMessage::SetApiTargetUrl { url } => {
                self.persist(keys::API_TARGET_URL, Value::String(url))?;
                Ok(ControlResponse::ok())
            }
            ControlMessage::SetConsoleTargetUrl { url } => {
                self.persist(keys::CONSOLE_TARGET_URL, Value::String(url))?;
                Ok(ControlResponse::ok())
            }
            ControlMessage::GetApiTargetUrl => Ok(ControlResponse::Url {
                url: self.observer.read().settings().api_target_url.clone(),
            }),
            ControlMessage::GetConsoleTargetUrl => Ok(ControlResponse::Url {
                url: self.observer.read().settings().console_target_url.clone(),
            }),
            ControlMessage::SetLoggingActive { active } => {
                self.persist(keys::IS_LOGGING_ACTIVE, Value::Bool(active))?;
                info!("Logging {}", if active { "activated" } else { "deactivated" });
                Ok(ControlResponse::ok())
            }
            ControlMessage::GetLoggingActive => Ok(ControlResponse::Active {
                active: self.observer.read().settings().logging_active,
            }),
            ControlMessage::GetConsoleLogs => Ok(ControlResponse::ConsoleLogs {
                logs: logs::console_lines(self.storage.as_ref())?,
            }),
            ControlMessage::ClearConsoleLogs => {
                self.storage.clear_collection(keys::CONSOLE_LOGS)?;
                Ok(ControlResponse::ok())
            }
        }
    }

    /// Write a setting and update the observer's mirror right away.
    ///
    /// The observer lock is held across the write, so direct updates land in
    /// the same order as the store's notifications, which reach the observer
    /// again later.
    fn persist(&self, key: &str, value: Value) -> Result<()> {
        let mut observer = self.observer.write();
        self.storage.set(key, value.clone())?;
        observer.apply_change(&StorageChange::Value {
            key: key.to_string(),
            old_value: None,
            new_value: Some(value),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::settings::CaptureSettings;
    use crate::types::{BeforeSendEvent, LogLevel, RequestId};
    use netscribe_store::MemoryStore;
    use serde_json::json;

    fn service() -> (ControlService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let observer = RequestObserver::new(CaptureSettings::default(), Arc::new(ManualClock::new(0)));
        let service = ControlService::new(Arc::new(RwLock::new(observer)), store.clone());
        (service, store)
    }

    #[test]
    fn test_messages_parse_from_json() {
        let msg: ControlMessage =
            serde_json::from_value(json!({"action": "setApiTargetUrl", "url": "api.x"})).unwrap();
        assert_eq!(msg, ControlMessage::SetApiTargetUrl { url: "api.x".into() });
        let msg: ControlMessage = serde_json::from_value(json!({"action": "getLoggingActive"})).unwrap();
        assert_eq!(msg, ControlMessage::GetLoggingActive);
        assert!(serde_json::from_value::<ControlMessage>(json!({"action": "reboot"})).is_err());
    }

    #[test]
    fn test_setters_persist_and_getters_reflect() {
        let (service, store) = service();
        service
            .handle(ControlMessage::SetApiTargetUrl { url: "api.example.com".into() })
            .unwrap();
        service
            .handle(ControlMessage::SetLoggingActive { active: true })
            .unwrap();

        assert_eq!(store.get_string(keys::API_TARGET_URL).unwrap(), "api.example.com");
        let url = service.handle(ControlMessage::GetApiTargetUrl).unwrap();
        assert_eq!(url.url(), Some("api.example.com"));
        let active = service.handle(ControlMessage::GetLoggingActive).unwrap();
        assert_eq!(active.active(), Some(true));
    }

    #[test]
    fn test_concurrent_setters_leave_mirrors_in_step() {
        let (service, store) = service();
        let mut rx = store.subscribe();

        std::thread::scope(|scope| {
            for writer in ["a", "b"] {
                let service = service.clone();
                scope.spawn(move || {
                    for n in 0..100 {
                        service
                            .handle(ControlMessage::SetApiTargetUrl {
                                url: format!("{}-{}", writer, n),
                            })
                            .unwrap();
                    }
                });
            }
        });

        let stored = store.get_string(keys::API_TARGET_URL).unwrap();
        assert_eq!(service.observer().read().settings().api_target_url, stored);

        let mut mirror = CaptureSettings::default();
        let mut seen = 0;
        while let Ok(change) = rx.try_recv() {
            mirror.apply(&change);
            seen += 1;
        }
        assert_eq!(seen, 200);
        assert_eq!(mirror.api_target_url, stored);
    }

    #[test]
    fn test_response_json_shapes() {
        let (service, _) = service();
        let ok = service.handle(ControlMessage::ClearConsoleLogs).unwrap();
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"success": true}));
        let url = service.handle(ControlMessage::GetConsoleTargetUrl).unwrap();
        assert_eq!(serde_json::to_value(&url).unwrap(), json!({"url": ""}));
        let logs = service.handle(ControlMessage::GetNetworkLogs).unwrap();
        assert_eq!(serde_json::to_value(&logs).unwrap(), json!({"logs": []}));
    }

    #[test]
    fn test_clear_network_logs_empties_observer() {
        let (service, _) = service();
        service
            .handle(ControlMessage::SetApiTargetUrl { url: "api.example.com".into() })
            .unwrap();
        service
            .handle(ControlMessage::SetLoggingActive { active: true })
            .unwrap();
        service.observer().write().on_before_send(BeforeSendEvent {
            request_id: RequestId::new("1"),
            method: "GET".into(),
            url: "https://api.example.com/a".into(),
            request_body: None,
            request_headers: Vec::new(),
        });
        assert_eq!(
            service.handle(ControlMessage::GetNetworkLogs).unwrap().log_count(),
            Some(1)
        );

        service.handle(ControlMessage::ClearNetworkLogs).unwrap();
        assert_eq!(
            service.handle(ControlMessage::GetNetworkLogs).unwrap().log_count(),
            Some(0)
        );
    }

    #[test]
    fn test_console_logs_read_and_cleared_from_storage() {
        let (service, store) = service();
        logs::append_console_line(
            store.as_ref(),
            &CapturedLogLine {
                timestamp: "t".into(),
                level: LogLevel::Warn,
                message: "careful".into(),
                url: "https://app.local/".into(),
            },
        )
        .unwrap();

        let reply = service.handle(ControlMessage::GetConsoleLogs).unwrap();
        assert_eq!(reply.log_count(), Some(1));
        service.handle(ControlMessage::ClearConsoleLogs).unwrap();
        assert_eq!(store.count(keys::CONSOLE_LOGS).unwrap(), 0);
    }
}
