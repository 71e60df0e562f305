//! Keeps the observer's settings mirror in step with storage.

use std::sync::Arc;

use netscribe_capture::CaptureSettings;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::state::AppState;

/// Start the background task applying storage changes to the observer.
pub fn start_settings_watcher(state: Arc<AppState>) {
    let mut rx = match state.take_changes_rx() {
        Some(rx) => rx,
        None => {
            error!("Settings watcher already started");
            return;
        }
    };

    tokio::spawn(async move {
        info!("Settings watcher started");
        loop {
            match rx.recv().await {
                Ok(change) => {
                    let delta = state.observer().write().apply_change(&change);
                    if delta.deactivated {
                        info!("Logging deactivated");
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Settings watcher missed {} changes; reloading", n);
                    match CaptureSettings::load(state.store.as_ref()) {
                        Ok(settings) => *state.observer().write().settings_mut() = settings,
                        Err(e) => warn!("Failed to reload settings: {}", e),
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("Settings watcher stopped");
    });
}
