//! Capture engine — request observer, page interceptor, relay, control surface.
//!
//! Each browser context is an explicitly owned state object:
//! - [`RequestObserver`] joins request lifecycle events by identifier.
//! - [`page::Interceptor`] wraps the page console and request object.
//! - [`Relay`] moves validated page messages into shared storage.
//! - [`ControlService`] and [`ControlPanel`] answer control messages and
//!   export text reports.
//!
//! Configuration lives in storage; every context mirrors it and applies
//! change notifications as they arrive.

pub mod channel;
pub mod clock;
pub mod control;
pub mod export;
pub mod logs;
pub mod matching;
pub mod observer;
pub mod page;
pub mod panel;
pub mod relay;
pub mod settings;
pub mod types;

pub use channel::{ChannelError, Envelope, PageChannel, PageMessage, WindowId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use control::{ControlMessage, ControlResponse, ControlService};
pub use export::{
    build_export, read_network_report, DirectoryDownloads, Downloads, ExportBundle, ReportBody,
    ReportEntry, ReportFile,
};
pub use observer::{EventOutcome, RequestObserver};
pub use panel::{ControlPanel, DownloadReport, LogCounts, StatusMessage};
pub use relay::{Relay, RelayOutcome, SkipReason};
pub use settings::{CaptureSettings, SettingsDelta};
pub use types::*;
