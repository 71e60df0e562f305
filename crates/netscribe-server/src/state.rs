//! Shared application state.

use std::sync::Arc;

use netscribe_capture::{
    CaptureSettings, Clock, ControlPanel, ControlService, DirectoryDownloads, RequestObserver,
};
use netscribe_core::{NetscribeConfig, Result};
use netscribe_store::{Storage, StorageChange};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::pages::PageRegistry;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: NetscribeConfig,
    pub store: Arc<dyn Storage>,
    pub clock: Arc<dyn Clock>,
    pub control: ControlService,
    pub panel: ControlPanel,
    pub pages: PageRegistry,
    changes_rx: parking_lot::Mutex<Option<broadcast::Receiver<StorageChange>>>,
}

impl AppState {
    pub fn new(config: NetscribeConfig, store: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Result<Self> {
        // Subscribe before loading so the observer mirror never misses a write.
        let changes_rx = store.subscribe();
        let settings = CaptureSettings::load(store.as_ref())?;

        let observer = Arc::new(RwLock::new(RequestObserver::new(settings, clock.clone())));
        let control = ControlService::new(observer.clone(), store.clone());
        let downloads = Arc::new(DirectoryDownloads::new(&config.data_paths.exports));
        let panel = ControlPanel::new(control.clone(), downloads, clock.clone());

        Ok(Self {
            config,
            store,
            clock,
            control,
            panel,
            pages: PageRegistry::new(),
            changes_rx: parking_lot::Mutex::new(Some(changes_rx)),
        })
    }

    pub fn observer(&self) -> &Arc<RwLock<RequestObserver>> {
        self.control.observer()
    }

    /// Take the observer's change stream (can only be called once, by the watcher).
    pub fn take_changes_rx(&self) -> Option<broadcast::Receiver<StorageChange>> {
        self.changes_rx.lock().take()
    }
}
