//! Console decorator: call through to the original, then capture.

use std::sync::Arc;

use crate::channel::{ConsoleMessage, PageMessage};
use crate::page::context::PageContext;
use crate::page::value::{format_arg, PageValue};
use crate::types::LogLevel;

/// The page's original console.
pub trait ConsoleBackend {
    fn write(&self, level: LogLevel, args: &[PageValue]);
}

/// Console wrapper installed by the interceptor.
pub struct InstrumentedConsole<C> {
    original: C,
    page: Arc<PageContext>,
}

impl<C: ConsoleBackend> InstrumentedConsole<C> {
    pub fn new(original: C, page: Arc<PageContext>) -> Self {
        Self { original, page }
    }

    pub fn log(&self, args: &[PageValue]) {
        self.call(LogLevel::Log, args);
    }

    pub fn warn(&self, args: &[PageValue]) {
        self.call(LogLevel::Warn, args);
    }

    pub fn error(&self, args: &[PageValue]) {
        self.call(LogLevel::Error, args);
    }

    pub fn info(&self, args: &[PageValue]) {
        self.call(LogLevel::Info, args);
    }

    /// Forward unchanged, then post the captured call.
    pub fn call(&self, level: LogLevel, args: &[PageValue]) {
        self.original.write(level, args);

        let payload = args.iter().map(format_arg).collect::<Vec<_>>().join(" ");
        let message = PageMessage::Console(ConsoleMessage {
            level,
            payload,
            timestamp: self.page.clock().now_iso(),
            url: self.page.url(),
        });
        self.page.channel().post(self.page.window(), &message);
    }

    /// The wrapped console.
    pub fn original(&self) -> &C {
        &self.original
    }
}
