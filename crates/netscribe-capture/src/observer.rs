//! Request observer — joins before-send, completed and failed events.
//!
//! Records are keyed by the host's request identifier. The join is scoped
//! to a capture session: `clear()` starts a new session, so a terminal event
//! for a request begun before the clear finds nothing and is dropped rather
//! than merged into an unrelated record.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{iso_timestamp, Clock};
use crate::matching::matches_target;
use crate::settings::{CaptureSettings, SettingsDelta};
use crate::types::*;
use netscribe_store::StorageChange;

/// Methods the observer records.
const CAPTURED_METHODS: &[&str] = &["GET", "POST"];

/// Result of feeding one lifecycle event to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventOutcome {
    /// A new pending record was buffered.
    Recorded,
    /// A pending record reached its terminal state.
    Completed,
    Failed,
    /// Filtered out (inactive, URL or method mismatch).
    Skipped,
    /// No buffered record carries this identifier.
    Unmatched,
    /// The record already received a terminal event.
    AlreadyTerminal,
}

/// Owned state of the request observer context.
pub struct RequestObserver {
    settings: CaptureSettings,
    clock: Arc<dyn Clock>,
    session: u64,
    records: Vec<CapturedRequest>,
    /// Identifier → index of the newest record using it in this session.
    live: HashMap<RequestId, usize>,
}

impl RequestObserver {
    pub fn new(settings: CaptureSettings, clock: Arc<dyn Clock>) -> Self {
        info!(
            "RequestObserver initialized: active={}, target={:?}",
            settings.logging_active, settings.api_target_url
        );
        Self {
            settings,
            clock,
            session: 1,
            records: Vec::new(),
            live: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut CaptureSettings {
        &mut self.settings
    }

    /// Apply a storage change notification to the configuration mirror.
    pub fn apply_change(&mut self, change: &StorageChange) -> SettingsDelta {
        self.settings.apply(change)
    }

    /// Current capture session number; bumped by `clear()`.
    pub fn session(&self) -> u64 {
        self.session
    }

    // ---------------------------------------------------------------
    // Lifecycle events
    // ---------------------------------------------------------------

    pub fn on_before_send(&mut self, event: BeforeSendEvent) -> EventOutcome {
        if !self.settings.logging_active {
            return EventOutcome::Skipped;
        }
        if !CAPTURED_METHODS.contains(&event.method.as_str())
            || !matches_target(&event.url, &self.settings.api_target_url)
        {
            return EventOutcome::Skipped;
        }

        let start_time = self.clock.now_millis();
        let request_body = event.request_body.as_ref().and_then(decode_body);

        if let Some(&previous) = self.live.get(&event.request_id) {
            // The host should never reuse an identifier within a session.
            // The newest lifecycle wins; the older record stays as it is.
            warn!(
                "Request id {} reused in session {} (previous record #{})",
                event.request_id,
                self.session,
                previous + 1
            );
        }

        self.live.insert(event.request_id.clone(), self.records.len());
        self.records.push(CapturedRequest {
            id: event.request_id,
            method: event.method,
            url: event.url,
            request_body,
            request_headers: header_map(&event.request_headers),
            response_headers: HeaderMap::new(),
            status: None,
            duration: None,
            start_time,
            timestamp: iso_timestamp(start_time),
            error: None,
        });
        EventOutcome::Recorded
    }

    pub fn on_completed(&mut self, event: CompletedEvent) -> EventOutcome {
        if !self.settings.logging_active {
            return EventOutcome::Skipped;
        }
        let now = self.clock.now_millis();
        let Some(record) = self.pending_mut(&event.request_id) else {
            return self.miss(&event.request_id);
        };

        record.status = Some(event.status_code);
        record.duration = Some((now - record.start_time).max(0) as u64);
        record.response_headers = header_map(&event.response_headers);
        EventOutcome::Completed
    }

    pub fn on_failed(&mut self, event: FailedEvent) -> EventOutcome {
        if !self.settings.logging_active {
            return EventOutcome::Skipped;
        }
        let Some(record) = self.pending_mut(&event.request_id) else {
            return self.miss(&event.request_id);
        };

        record.status = Some(0);
        record.error = Some(event.error);
        EventOutcome::Failed
    }

    fn pending_mut(&mut self, id: &RequestId) -> Option<&mut CapturedRequest> {
        let idx = *self.live.get(id)?;
        self.records.get_mut(idx).filter(|r| r.is_pending())
    }

    fn miss(&self, id: &RequestId) -> EventOutcome {
        match self.live.get(id) {
            Some(_) => {
                debug!("Ignoring second terminal event for request {}", id);
                EventOutcome::AlreadyTerminal
            }
            None => {
                debug!("No buffered request for id {}", id);
                EventOutcome::Unmatched
            }
        }
    }

    // ---------------------------------------------------------------
    // Buffer access
    // ---------------------------------------------------------------

    /// Buffered records in capture order.
    pub fn logs(&self) -> &[CapturedRequest] {
        &self.records
    }

    pub fn get(&self, id: &RequestId) -> Option<&CapturedRequest> {
        self.live.get(id).and_then(|&idx| self.records.get(idx))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every buffered record and start a new session.
    pub fn clear(&mut self) {
        let dropped = self.records.len();
        self.records.clear();
        self.live.clear();
        self.session += 1;
        info!(
            "Observer buffer cleared ({} records), session {}",
            dropped, self.session
        );
    }
}

/// Decode a before-send body: first raw chunk as UTF-8, or form fields as JSON.
///
/// Undecodable bodies are recorded as absent.
fn decode_body(body: &RequestBody) -> Option<String> {
    if let Some(first) = body.raw.first() {
        let bytes = first.bytes.as_ref()?;
        return match String::from_utf8(bytes.clone()) {
            Ok(text) => Some(text),
            Err(e) => {
                debug!("Request body is not UTF-8: {}", e);
                None
            }
        };
    }
    if let Some(form) = &body.form_data {
        return serde_json::to_string(form).ok();
    }
    None
}
