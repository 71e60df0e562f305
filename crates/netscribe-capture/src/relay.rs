//! Relay/bridge — one per page.
//!
//! Decides whether the interceptor belongs on the page, validates what the
//! page posts, and appends accepted messages to shared storage. Active flag
//! and target matches are re-checked when each message arrives, not only
//! at injection time.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, ConsoleMessage, Envelope, NetworkMessage, PageMessage};
use crate::logs;
use crate::matching::matches_normalized;
use crate::page::{InstallOutcome, Interceptor, PageContext, PageMarker};
use crate::settings::CaptureSettings;
use crate::types::{CapturedLogLine, NetworkLogEntry};
use netscribe_core::{Error, Result};
use netscribe_store::keys;
use netscribe_store::{Storage, StorageChange};

/// Why a valid message was not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Inactive,
    /// The page URL does not contain the console target.
    PageNotTargeted,
    /// The request URL does not contain the network target.
    UrlNotTargeted,
}

/// What the relay did with one envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RelayOutcome {
    Persisted { collection: &'static str, total: usize },
    Skipped { reason: SkipReason },
    Rejected { error: ChannelError },
}

/// Owned state of one page's relay.
pub struct Relay {
    page: Arc<PageContext>,
    storage: Arc<dyn Storage>,
    settings: CaptureSettings,
    interceptor: Option<Interceptor>,
    inbox: Option<broadcast::Receiver<Envelope>>,
    changes: Option<broadcast::Receiver<StorageChange>>,
}

impl Relay {
    /// Attach to a page: load settings and inject when the page qualifies.
    ///
    /// Fails if a relay is already attached to this page load.
    pub fn start(page: Arc<PageContext>, storage: Arc<dyn Storage>) -> Result<Self> {
        if !page.mark(PageMarker::RelayAttached) {
            return Err(Error::Internal(format!(
                "relay already attached to {}",
                page.window()
            )));
        }

        // Subscribe before loading so nothing slips in between.
        let inbox = page.channel().subscribe();
        let changes = storage.subscribe();
        let settings = CaptureSettings::load(storage.as_ref())?;
        debug!(
            "Relay settings for {}: console={:?} api={:?} active={}",
            page.url(),
            settings.console_target_url,
            settings.api_target_url,
            settings.logging_active
        );

        let mut relay = Self {
            page,
            storage,
            settings,
            interceptor: None,
            inbox: Some(inbox),
            changes: Some(changes),
        };
        if relay.settings.logging_active && relay.should_inject() {
            relay.inject();
        }
        Ok(relay)
    }

    pub fn page(&self) -> &Arc<PageContext> {
        &self.page
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// The interceptor, once installed on this page.
    pub fn interceptor(&self) -> Option<&Interceptor> {
        self.interceptor.as_ref()
    }

    /// Take the storage change stream, for hosts that call
    /// [`Relay::apply_change`] themselves instead of using [`Relay::run`].
    pub fn take_change_stream(&mut self) -> Option<broadcast::Receiver<StorageChange>> {
        self.changes.take()
    }

    /// Whether the page URL contains the normalized console target.
    pub fn should_inject(&self) -> bool {
        matches_normalized(&self.page.url(), &self.settings.console_target_url)
    }

    fn is_api_url(&self, url: &str) -> bool {
        matches_normalized(url, &self.settings.api_target_url)
    }

    fn inject(&mut self) {
        if !self.page.mark(PageMarker::InjectionRequested) {
            debug!("Injection already requested on {}", self.page.window());
            return;
        }
        self.interceptor = match Interceptor::install(&self.page) {
            InstallOutcome::Installed(interceptor) => Some(interceptor),
            InstallOutcome::AlreadyInstalled => Interceptor::attached(&self.page),
        };
    }

    /// Apply a configuration change; injects when logging was just activated.
    pub fn apply_change(&mut self, change: &StorageChange) {
        let delta = self.settings.apply(change);
        if delta.activated && self.should_inject() {
            info!("Logging activated; injecting into {}", self.page.url());
            self.inject();
        }
    }

    /// Reload settings from storage after missed notifications.
    pub fn reload_settings(&mut self) -> Result<()> {
        let was_active = self.settings.logging_active;
        self.settings = CaptureSettings::load(self.storage.as_ref())?;
        if !was_active && self.settings.logging_active && self.should_inject() {
            self.inject();
        }
        Ok(())
    }

    /// Validate and persist one envelope.
    pub fn handle_envelope(&mut self, envelope: &Envelope) -> Result<RelayOutcome> {
        let message = match envelope.open(self.page.window()) {
            Ok(message) => message,
            Err(error) => {
                debug!("Rejected page message: {}", error);
                return Ok(RelayOutcome::Rejected { error });
            }
        };
        match message {
            PageMessage::Console(msg) => self.persist_console(msg),
            PageMessage::Network(msg) => self.persist_network(msg),
        }
    }

    fn persist_console(&self, msg: ConsoleMessage) -> Result<RelayOutcome> {
        if !self.settings.logging_active {
            return Ok(RelayOutcome::Skipped { reason: SkipReason::Inactive });
        }
        if !self.should_inject() {
            return Ok(RelayOutcome::Skipped { reason: SkipReason::PageNotTargeted });
        }

        let line = CapturedLogLine {
            timestamp: msg.timestamp,
            level: msg.level,
            message: msg.payload,
            url: msg.url,
        };
        let total = logs::append_console_line(self.storage.as_ref(), &line)?;
        debug!("Console line saved, total {}", total);
        Ok(RelayOutcome::Persisted {
            collection: keys::CONSOLE_LOGS,
            total,
        })
    }

    fn persist_network(&self, msg: NetworkMessage) -> Result<RelayOutcome> {
        if !self.settings.logging_active {
            return Ok(RelayOutcome::Skipped { reason: SkipReason::Inactive });
        }
        if !self.is_api_url(&msg.url) {
            return Ok(RelayOutcome::Skipped { reason: SkipReason::UrlNotTargeted });
        }

        let entry = NetworkLogEntry {
            timestamp: msg.timestamp,
            method: msg.method,
            url: msg.url,
            query_string: msg.query_string,
            request_headers: msg.request_headers,
            request_body: msg.request_body,
            response_headers: msg.response_headers,
            response_body: msg.response_body,
            status: Some(msg.status),
            status_text: Some(msg.status_text).filter(|s| !s.is_empty()),
            duration: Some(msg.duration),
            error: msg.error,
        };
        let total = logs::append_network_entry(self.storage.as_ref(), &entry)?;
        debug!("Network entry saved, total {}", total);
        Ok(RelayOutcome::Persisted {
            collection: keys::NETWORK_LOGS,
            total,
        })
    }

    /// Relay until `shutdown` resolves or both streams close.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        let (Some(mut envelopes), Some(mut changes)) = (self.inbox.take(), self.changes.take())
        else {
            warn!("Relay for {} was already run", self.page.window());
            return;
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                received = envelopes.recv() => match received {
                    Ok(envelope) => {
                        if let Err(e) = self.handle_envelope(&envelope) {
                            warn!("Failed to persist page message: {}", e);
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!("Relay lagged, {} page messages lost", n),
                    Err(RecvError::Closed) => break,
                },
                received = changes.recv() => match received {
                    Ok(change) => self.apply_change(&change),
                    Err(RecvError::Lagged(n)) => {
                        warn!("Relay missed {} storage changes; reloading settings", n);
                        if let Err(e) = self.reload_settings() {
                            warn!("Failed to reload settings: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        info!("Relay for {} stopped", self.page.window());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::WindowId;
    use crate::clock::ManualClock;
    use crate::types::LogLevel;
    use netscribe_store::MemoryStore;
    use serde_json::json;

    fn store_with(api: &str, console: &str, active: bool) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::API_TARGET_URL, json!(api)).unwrap();
        store.set(keys::CONSOLE_TARGET_URL, json!(console)).unwrap();
        store.set(keys::IS_LOGGING_ACTIVE, json!(active)).unwrap();
        store
    }

    fn page(url: &str) -> Arc<PageContext> {
        PageContext::new(url, Arc::new(ManualClock::new(0)))
    }

    fn console_envelope(page: &PageContext) -> Envelope {
        Envelope {
            sender: page.window(),
            data: PageMessage::Console(ConsoleMessage {
                level: LogLevel::Error,
                payload: "boom".into(),
                timestamp: "1970-01-01T00:00:00.000Z".into(),
                url: page.url(),
            })
            .to_value(),
        }
    }

    fn network_envelope(page: &PageContext, url: &str) -> Envelope {
        Envelope {
            sender: page.window(),
            data: json!({
                "source": "logger-extension-network",
                "method": "GET",
                "url": url,
                "status": 200,
                "statusText": "OK",
                "duration": 5,
                "timestamp": "1970-01-01T00:00:00.000Z"
            }),
        }
    }

    #[test]
    fn test_injects_on_matching_page() {
        let store = store_with("api.example.com", "https://app.local/", true);
        let relay = Relay::start(page("http://app.local/dashboard"), store).unwrap();
        assert!(relay.interceptor().is_some());
    }

    #[test]
    fn test_no_injection_when_inactive_or_other_page() {
        let store = store_with("api.example.com", "app.local", false);
        let relay = Relay::start(page("https://app.local/"), store).unwrap();
        assert!(relay.interceptor().is_none());

        let store = store_with("api.example.com", "app.local", true);
        let relay = Relay::start(page("https://other.site/"), store).unwrap();
        assert!(relay.interceptor().is_none());
    }

    #[test]
    fn test_second_relay_on_same_page_fails() {
        let store = store_with("", "app.local", true);
        let p = page("https://app.local/");
        let _relay = Relay::start(p.clone(), store.clone()).unwrap();
        assert!(Relay::start(p, store).is_err());
    }

    #[test]
    fn test_console_message_persisted() {
        let store = store_with("api.example.com", "app.local", true);
        let p = page("https://app.local/");
        let mut relay = Relay::start(p.clone(), store.clone()).unwrap();

        let outcome = relay.handle_envelope(&console_envelope(&p)).unwrap();
        assert_eq!(
            outcome,
            RelayOutcome::Persisted {
                collection: keys::CONSOLE_LOGS,
                total: 1
            }
        );
        let lines = logs::console_lines(store.as_ref()).unwrap();
        assert_eq!(lines[0].message, "boom");
        assert_eq!(lines[0].level, LogLevel::Error);
    }

    #[test]
    fn test_foreign_window_rejected() {
        let store = store_with("api.example.com", "app.local", true);
        let p = page("https://app.local/");
        let mut relay = Relay::start(p.clone(), store.clone()).unwrap();

        let mut envelope = console_envelope(&p);
        envelope.sender = WindowId::next();
        let outcome = relay.handle_envelope(&envelope).unwrap();
        assert!(matches!(
            outcome,
            RelayOutcome::Rejected {
                error: ChannelError::ForeignSender(_)
            }
        ));
        assert_eq!(store.count(keys::CONSOLE_LOGS).unwrap(), 0);
    }

    #[test]
    fn test_network_filtered_by_api_target() {
        let store = store_with("https://api.example.com/", "app.local", true);
        let p = page("https://app.local/");
        let mut relay = Relay::start(p.clone(), store.clone()).unwrap();

        let skipped = relay
            .handle_envelope(&network_envelope(&p, "https://cdn.example.com/lib.js"))
            .unwrap();
        assert_eq!(
            skipped,
            RelayOutcome::Skipped {
                reason: SkipReason::UrlNotTargeted
            }
        );

        relay
            .handle_envelope(&network_envelope(&p, "https://api.example.com/items"))
            .unwrap();
        let entries = logs::network_entries(store.as_ref()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, Some(200));
        assert_eq!(entries[0].status_text.as_deref(), Some("OK"));
    }

    #[test]
    fn test_deactivation_stops_persisting_but_keeps_entries() {
        let store = store_with("api.example.com", "app.local", true);
        let p = page("https://app.local/");
        let mut relay = Relay::start(p.clone(), store.clone()).unwrap();
        relay.handle_envelope(&console_envelope(&p)).unwrap();

        store.set(keys::IS_LOGGING_ACTIVE, json!(false)).unwrap();
        relay.apply_change(&StorageChange::Value {
            key: keys::IS_LOGGING_ACTIVE.into(),
            old_value: Some(json!(true)),
            new_value: Some(json!(false)),
        });

        let outcome = relay.handle_envelope(&console_envelope(&p)).unwrap();
        assert_eq!(outcome, RelayOutcome::Skipped { reason: SkipReason::Inactive });
        assert_eq!(store.count(keys::CONSOLE_LOGS).unwrap(), 1);
    }

    #[test]
    fn test_activation_injects_without_reload() {
        let store = store_with("api.example.com", "app.local", false);
        let p = page("https://app.local/");
        let mut relay = Relay::start(p.clone(), store).unwrap();
        assert!(relay.interceptor().is_none());

        relay.apply_change(&StorageChange::Value {
            key: keys::IS_LOGGING_ACTIVE.into(),
            old_value: Some(json!(false)),
            new_value: Some(json!(true)),
        });
        assert!(relay.interceptor().is_some());
        assert!(p.is_marked(PageMarker::InterceptorInstalled));
    }

    #[test]
    fn test_page_match_rechecked_at_receipt() {
        let store = store_with("api.example.com", "app.local", true);
        let p = page("https://app.local/");
        let mut relay = Relay::start(p.clone(), store.clone()).unwrap();

        relay.apply_change(&StorageChange::Value {
            key: keys::CONSOLE_TARGET_URL.into(),
            old_value: Some(json!("app.local")),
            new_value: Some(json!("elsewhere.local")),
        });
        let outcome = relay.handle_envelope(&console_envelope(&p)).unwrap();
        assert_eq!(
            outcome,
            RelayOutcome::Skipped {
                reason: SkipReason::PageNotTargeted
            }
        );
    }
}
