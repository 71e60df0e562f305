//! Per-page-load state shared by the relay and the interceptor.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{PageChannel, WindowId};
use crate::clock::Clock;

/// Page-global markers; each can be set once per page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageMarker {
    RelayAttached,
    InjectionRequested,
    InterceptorInstalled,
}

/// One page load: its window, URL, channel and install markers.
pub struct PageContext {
    window: WindowId,
    url: String,
    channel: PageChannel,
    clock: Arc<dyn Clock>,
    markers: Mutex<HashSet<PageMarker>>,
}

impl PageContext {
    pub fn new(url: impl Into<String>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            window: WindowId::next(),
            url: url.into(),
            channel: PageChannel::new(),
            clock,
            markers: Mutex::new(HashSet::new()),
        })
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    /// Current location of the page.
    pub fn url(&self) -> String {
        self.url.clone()
    }

    pub fn channel(&self) -> &PageChannel {
        &self.channel
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Set a marker. Returns `false` if it was already set.
    pub fn mark(&self, marker: PageMarker) -> bool {
        self.markers.lock().insert(marker)
    }

    pub fn is_marked(&self, marker: PageMarker) -> bool {
        self.markers.lock().contains(&marker)
    }
}
