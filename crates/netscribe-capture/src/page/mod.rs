//! Page-context interceptor.
//!
//! The page's console and request object are reached through
//! [`ConsoleBackend`] and [`XhrBackend`]. Installing the [`Interceptor`] on a
//! page hands out decorators that call through to the original and then
//! post what they observed on the page channel.

pub mod console;
pub mod context;
pub mod http;
pub mod value;
pub mod xhr;

use std::sync::Arc;

use tracing::{debug, info};

pub use console::{ConsoleBackend, InstrumentedConsole};
pub use context::{PageContext, PageMarker};
pub use http::{parse_raw_headers, split_query};
pub use value::{format_arg, safe_stringify, PageValue, CIRCULAR_PLACEHOLDER};
pub use xhr::{InterceptedXhr, ReadyState, XhrBackend};

/// Handle to the interception installed on one page.
#[derive(Clone)]
pub struct Interceptor {
    page: Arc<PageContext>,
}

/// Result of an installation attempt.
pub enum InstallOutcome {
    Installed(Interceptor),
    /// The page-global marker was already set; nothing changed.
    AlreadyInstalled,
}

impl Interceptor {
    /// Install at most once per page load.
    pub fn install(page: &Arc<PageContext>) -> InstallOutcome {
        if !page.mark(PageMarker::InterceptorInstalled) {
            debug!("Interceptor already installed on {}", page.window());
            return InstallOutcome::AlreadyInstalled;
        }
        info!("Console override and network intercept active on {}", page.url());
        InstallOutcome::Installed(Self { page: page.clone() })
    }

    /// The interceptor of `page`, if one was installed.
    pub fn attached(page: &Arc<PageContext>) -> Option<Self> {
        page.is_marked(PageMarker::InterceptorInstalled)
            .then(|| Self { page: page.clone() })
    }

    pub fn page(&self) -> &Arc<PageContext> {
        &self.page
    }

    /// Wrap the page console.
    pub fn console<C: ConsoleBackend>(&self, original: C) -> InstrumentedConsole<C> {
        InstrumentedConsole::new(original, self.page.clone())
    }

    /// Wrap one page request object.
    pub fn xhr<B: XhrBackend>(&self, original: B) -> InterceptedXhr<B> {
        InterceptedXhr::new(original, self.page.clone())
    }
}
