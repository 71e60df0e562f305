//! Control surface: the settings form, counters and the download button.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::control::{ControlMessage, ControlResponse, ControlService};
use crate::export::{build_export, Downloads};
use crate::logs;
use crate::settings::CaptureSettings;
use netscribe_core::Result;
use netscribe_store::keys;

pub const MSG_URL_REQUIRED: &str = "Enter at least one URL!";
pub const MSG_SETTINGS_SAVED: &str = "Settings saved! Refresh the page (F5)";
pub const MSG_LOGS_CLEARED: &str = "Logs cleared!";
pub const MSG_LOGS_DOWNLOADED: &str = "Logs downloaded!";
pub const MSG_NO_LOGS: &str = "No logs yet!";

/// Transient status line shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
}

impl StatusMessage {
    fn success(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_error: false,
        }
    }

    fn error(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_error: true,
        }
    }
}

/// Counters shown in the panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogCounts {
    /// Requests in the observer buffer.
    pub network: usize,
    /// Requests persisted by page relays.
    pub page_network: usize,
    pub console: usize,
}

/// Result of pressing download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub status: StatusMessage,
    pub saved: Vec<PathBuf>,
}

pub struct ControlPanel {
    control: ControlService,
    downloads: Arc<dyn Downloads>,
    clock: Arc<dyn Clock>,
}

impl ControlPanel {
    pub fn new(control: ControlService, downloads: Arc<dyn Downloads>, clock: Arc<dyn Clock>) -> Self {
        Self {
            control,
            downloads,
            clock,
        }
    }

    /// Current settings as the background context reports them.
    pub fn load_settings(&self) -> Result<CaptureSettings> {
        let api = self.control.handle(ControlMessage::GetApiTargetUrl)?;
        let console = self.control.handle(ControlMessage::GetConsoleTargetUrl)?;
        let active = self.control.handle(ControlMessage::GetLoggingActive)?;
        Ok(CaptureSettings {
            api_target_url: api.url().unwrap_or_default().to_string(),
            console_target_url: console.url().unwrap_or_default().to_string(),
            logging_active: active.active().unwrap_or(false),
        })
    }

    /// Save the form. Saving as inactive also discards every captured log.
    pub fn save_settings(&self, api_url: &str, console_url: &str, active: bool) -> Result<StatusMessage> {
        let api_url = api_url.trim();
        let console_url = console_url.trim();
        if api_url.is_empty() && console_url.is_empty() {
            return Ok(StatusMessage::error(MSG_URL_REQUIRED));
        }

        self.control.handle(ControlMessage::SetApiTargetUrl {
            url: api_url.to_string(),
        })?;
        self.control.handle(ControlMessage::SetConsoleTargetUrl {
            url: console_url.to_string(),
        })?;
        self.control.handle(ControlMessage::SetLoggingActive { active })?;

        if !active {
            self.clear_all()?;
        }
        Ok(StatusMessage::success(MSG_SETTINGS_SAVED))
    }

    pub fn counts(&self) -> Result<LogCounts> {
        let network = self
            .control
            .handle(ControlMessage::GetNetworkLogs)?
            .log_count()
            .unwrap_or(0);
        let console = self
            .control
            .handle(ControlMessage::GetConsoleLogs)?
            .log_count()
            .unwrap_or(0);
        let page_network = self.control.storage().count(keys::NETWORK_LOGS)?;
        Ok(LogCounts {
            network,
            page_network,
            console,
        })
    }

    pub fn clear(&self) -> Result<StatusMessage> {
        self.clear_all()?;
        Ok(StatusMessage::success(MSG_LOGS_CLEARED))
    }

    fn clear_all(&self) -> Result<()> {
        self.control.handle(ControlMessage::ClearNetworkLogs)?;
        self.control.handle(ControlMessage::ClearConsoleLogs)?;
        self.control.storage().clear_collection(keys::NETWORK_LOGS)?;
        info!("All captured logs cleared");
        Ok(())
    }

    /// Render both reports and hand the non-empty ones to the download sink.
    pub fn download(&self) -> Result<DownloadReport> {
        let observed = match self.control.handle(ControlMessage::GetNetworkLogs)? {
            ControlResponse::NetworkLogs { logs } => logs,
            other => {
                warn!("Unexpected reply to getNetworkLogs: {:?}", other);
                Vec::new()
            }
        };
        let console = match self.control.handle(ControlMessage::GetConsoleLogs)? {
            ControlResponse::ConsoleLogs { logs } => logs,
            other => {
                warn!("Unexpected reply to getConsoleLogs: {:?}", other);
                Vec::new()
            }
        };
        let page_entries = logs::network_entries(self.control.storage().as_ref())?;

        let bundle = build_export(&page_entries, &observed, &console, &self.clock.now_iso());
        if bundle.is_empty() {
            return Ok(DownloadReport {
                status: StatusMessage::error(MSG_NO_LOGS),
                saved: Vec::new(),
            });
        }

        let mut saved = Vec::new();
        for file in bundle.files() {
            saved.push(self.downloads.save(file)?);
        }
        Ok(DownloadReport {
            status: StatusMessage::success(MSG_LOGS_DOWNLOADED),
            saved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::export::DirectoryDownloads;
    use crate::observer::RequestObserver;
    use crate::types::{BeforeSendEvent, CapturedLogLine, LogLevel, NetworkLogEntry, RequestId};
    use netscribe_store::{MemoryStore, Storage};
    use parking_lot::RwLock;

    struct Fixture {
        panel: ControlPanel,
        store: Arc<MemoryStore>,
        control: ControlService,
        _dir: tempfile::TempDir,
        exports: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let exports = dir.path().join("exports");
        let clock = Arc::new(ManualClock::new(1_704_067_200_000));
        let store = Arc::new(MemoryStore::new());
        let observer = RequestObserver::new(CaptureSettings::default(), clock.clone());
        let control = ControlService::new(Arc::new(RwLock::new(observer)), store.clone());
        let panel = ControlPanel::new(
            control.clone(),
            Arc::new(DirectoryDownloads::new(&exports)),
            clock,
        );
        Fixture {
            panel,
            store,
            control,
            _dir: dir,
            exports,
        }
    }

    fn seed_console(store: &MemoryStore) {
        logs::append_console_line(
            store,
            &CapturedLogLine {
                timestamp: "2024-01-01T00:00:00.000Z".into(),
                level: LogLevel::Log,
                message: "hi".into(),
                url: "https://app.local/".into(),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_save_requires_a_url() {
        let f = fixture();
        let status = f.panel.save_settings("  ", "", true).unwrap();
        assert_eq!(status, StatusMessage::error(MSG_URL_REQUIRED));
        assert!(!f.panel.load_settings().unwrap().logging_active);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let f = fixture();
        let status = f
            .panel
            .save_settings(" api.example.com ", "app.local", true)
            .unwrap();
        assert!(!status.is_error);

        let settings = f.panel.load_settings().unwrap();
        assert_eq!(settings.api_target_url, "api.example.com");
        assert_eq!(settings.console_target_url, "app.local");
        assert!(settings.logging_active);
    }

    #[test]
    fn test_save_inactive_clears_everything() {
        let f = fixture();
        f.panel.save_settings("api.example.com", "", true).unwrap();
        f.control.observer().write().on_before_send(BeforeSendEvent {
            request_id: RequestId::new("1"),
            method: "GET".into(),
            url: "https://api.example.com/a".into(),
            request_body: None,
            request_headers: Vec::new(),
        });
        seed_console(&f.store);
        logs::append_network_entry(f.store.as_ref(), &NetworkLogEntry::default()).unwrap();
        assert_eq!(
            f.panel.counts().unwrap(),
            LogCounts {
                network: 1,
                page_network: 1,
                console: 1
            }
        );

        f.panel.save_settings("api.example.com", "", false).unwrap();
        assert_eq!(f.panel.counts().unwrap(), LogCounts::default());
    }

    #[test]
    fn test_download_with_nothing_captured() {
        let f = fixture();
        let report = f.panel.download().unwrap();
        assert_eq!(report.status, StatusMessage::error(MSG_NO_LOGS));
        assert!(report.saved.is_empty());
        assert!(!f.exports.exists());
    }

    #[test]
    fn test_download_writes_console_report() {
        let f = fixture();
        seed_console(&f.store);

        let report = f.panel.download().unwrap();
        assert_eq!(report.status, StatusMessage::success(MSG_LOGS_DOWNLOADED));
        assert_eq!(report.saved.len(), 1);
        assert_eq!(
            report.saved[0].file_name().unwrap(),
            "console-log-2024-01-01T00-00-00-000Z.txt"
        );
        let content = std::fs::read_to_string(&report.saved[0]).unwrap();
        assert!(content.starts_with("[2024-01-01T00:00:00.000Z] [LOG] hi\n"));
    }

    #[test]
    fn test_clear_keeps_settings() {
        let f = fixture();
        f.panel.save_settings("api.example.com", "app.local", true).unwrap();
        seed_console(&f.store);

        let status = f.panel.clear().unwrap();
        assert_eq!(status.text, MSG_LOGS_CLEARED);
        assert_eq!(f.store.count(keys::CONSOLE_LOGS).unwrap(), 0);
        assert!(f.panel.load_settings().unwrap().logging_active);
    }
}
