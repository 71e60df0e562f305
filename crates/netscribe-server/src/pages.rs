//! Open pages and their relays.

use std::collections::HashMap;
use std::sync::Arc;

use netscribe_capture::page::PageContext;
use netscribe_capture::{Clock, Relay};
use netscribe_core::{Error, Result};
use netscribe_store::Storage;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A page load tracked by the host.
pub struct PageHandle {
    pub relay: Arc<Mutex<Relay>>,
    watcher: JoinHandle<()>,
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedPage {
    pub page_id: String,
    pub injected: bool,
}

#[derive(Default)]
pub struct PageRegistry {
    pages: RwLock<HashMap<String, PageHandle>>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a relay for a new page load. Must be called inside a runtime.
    pub fn open(&self, url: &str, storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Result<OpenedPage> {
        let page = PageContext::new(url, clock);
        let mut relay = Relay::start(page, storage)?;
        let injected = relay.interceptor().is_some();
        let mut changes = relay
            .take_change_stream()
            .ok_or_else(|| Error::Internal("relay change stream already taken".into()))?;

        let relay = Arc::new(Mutex::new(relay));
        let weak = Arc::downgrade(&relay);
        let page_id = uuid::Uuid::new_v4().to_string();
        let log_id = page_id.clone();

        let watcher = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(relay) = weak.upgrade() else { break };
                        relay.lock().apply_change(&change);
                    }
                    Err(RecvError::Lagged(n)) => {
                        let Some(relay) = weak.upgrade() else { break };
                        warn!("Page {} missed {} changes; reloading settings", log_id, n);
                        let reloaded = relay.lock().reload_settings();
                        if let Err(e) = reloaded {
                            warn!("Failed to reload settings for page {}: {}", log_id, e);
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Change watcher for page {} stopped", log_id);
        });

        info!("Opened page {} at {} (injected={})", page_id, url, injected);
        self.pages.write().insert(
            page_id.clone(),
            PageHandle { relay, watcher },
        );
        Ok(OpenedPage { page_id, injected })
    }

    pub fn relay(&self, id: &str) -> Option<Arc<Mutex<Relay>>> {
        self.pages.read().get(id).map(|h| h.relay.clone())
    }

    /// Forget a page; its relay stops following settings.
    pub fn close(&self, id: &str) -> bool {
        let removed = self.pages.write().remove(id).is_some();
        if removed {
            info!("Closed page {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.pages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.read().is_empty()
    }
}
