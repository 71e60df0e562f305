//! Request-object decorator: record the call, call through, report the outcome.

use std::sync::Arc;

use tracing::debug;

use crate::channel::{NetworkMessage, PageMessage};
use crate::clock::iso_timestamp;
use crate::page::context::PageContext;
use crate::page::http::{parse_raw_headers, split_query};
use crate::types::HeaderMap;

/// Readiness of a page request object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    Unsent = 0,
    Opened = 1,
    HeadersReceived = 2,
    Loading = 3,
    Done = 4,
}

/// The page's original request object.
pub trait XhrBackend {
    fn open(&mut self, method: &str, url: &str);
    fn set_request_header(&mut self, name: &str, value: &str);
    fn send(&mut self, body: Option<&str>);
    fn ready_state(&self) -> ReadyState;
    fn status(&self) -> u16;
    fn status_text(&self) -> String;
    fn response_text(&self) -> Option<String>;
    /// Raw CRLF-separated response header block.
    fn all_response_headers(&self) -> String;
}

/// What `open`/`set_request_header`/`send` recorded for the current call.
#[derive(Debug, Clone)]
struct TrackedCall {
    method: String,
    url: String,
    start_time: i64,
    request_headers: HeaderMap,
    request_body: Option<String>,
    sent: bool,
    completion_posted: bool,
    error_posted: bool,
}

/// Request object wrapper installed by the interceptor.
pub struct InterceptedXhr<B> {
    original: B,
    page: Arc<PageContext>,
    call: Option<TrackedCall>,
}

impl<B: XhrBackend> InterceptedXhr<B> {
    pub fn new(original: B, page: Arc<PageContext>) -> Self {
        Self {
            original,
            page,
            call: None,
        }
    }

    pub fn open(&mut self, method: &str, url: &str) {
        self.call = Some(TrackedCall {
            method: method.to_string(),
            url: url.to_string(),
            start_time: self.page.clock().now_millis(),
            request_headers: HeaderMap::new(),
            request_body: None,
            sent: false,
            completion_posted: false,
            error_posted: false,
        });
        self.original.open(method, url);
    }

    pub fn set_request_header(&mut self, name: &str, value: &str) {
        if let Some(call) = self.call.as_mut() {
            call.request_headers.insert(name.to_string(), value.to_string());
        }
        self.original.set_request_header(name, value);
    }

    pub fn send(&mut self, body: Option<&str>) {
        if let Some(call) = self.call.as_mut() {
            call.request_body = body.map(str::to_string);
            call.sent = true;
        }
        self.original.send(body);
    }

    /// Readiness changed. Posts the completed request once it is `Done`.
    pub fn handle_ready_state_change(&mut self) {
        if self.original.ready_state() != ReadyState::Done {
            return;
        }
        let Some(call) = self.call.as_mut().filter(|c| c.sent && !c.completion_posted) else {
            return;
        };
        call.completion_posted = true;

        let now = self.page.clock().now_millis();
        let (base_url, query_string) = split_query(&call.url);
        let message = NetworkMessage {
            method: call.method.to_uppercase(),
            url: base_url,
            query_string,
            request_headers: call.request_headers.clone(),
            request_body: call.request_body.clone(),
            response_headers: parse_raw_headers(&self.original.all_response_headers()),
            response_body: self.original.response_text(),
            status: self.original.status(),
            status_text: self.original.status_text(),
            duration: (now - call.start_time).max(0) as u64,
            error: None,
            timestamp: iso_timestamp(call.start_time),
        };
        self.page
            .channel()
            .post(self.page.window(), &PageMessage::Network(message));
    }

    /// Transport-level error. Posts an error-shaped message once per send.
    pub fn handle_error(&mut self) {
        let Some(call) = self.call.as_mut().filter(|c| c.sent && !c.error_posted) else {
            debug!("Transport error on a request that was never sent");
            return;
        };
        call.error_posted = true;

        let now = self.page.clock().now_millis();
        let message = NetworkMessage {
            method: call.method.to_uppercase(),
            url: call.url.clone(),
            query_string: Default::default(),
            request_headers: call.request_headers.clone(),
            request_body: call.request_body.clone(),
            response_headers: HeaderMap::new(),
            response_body: None,
            status: 0,
            status_text: "Error".into(),
            duration: (now - call.start_time).max(0) as u64,
            error: Some("Network Error".into()),
            timestamp: iso_timestamp(call.start_time),
        };
        self.page
            .channel()
            .post(self.page.window(), &PageMessage::Network(message));
    }

    /// The wrapped request object.
    pub fn original(&self) -> &B {
        &self.original
    }

    pub fn original_mut(&mut self) -> &mut B {
        &mut self.original
    }
}
