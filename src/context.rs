//! Per-request context: the request data the engine consumes and the
//! response sink it writes into.
//!
//! One `RequestContext` is created per request by the host adapter, mutated
//! by filters and the handler, flushed by the host, and discarded. The
//! dispatch tables themselves never live here; the context is the only
//! mutable state a request touches.

use http::Method;
use serde_json::Value;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::ids::RequestId;

/// Maximum number of path/query parameters before heap allocation.
/// Most routes have well under eight captures.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated parameter storage for the hot path.
///
/// Names use `Arc<str>` because they come from the static route table and
/// clone in O(1); values are per-request data and stay `String`.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Stack-allocated header storage for the hot path.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Cancellation signal threaded through the request context.
///
/// The host flips it when the client disconnects or a deadline expires; a
/// long-running handler polls [`CancelToken::is_cancelled`] and bails out.
/// The dispatcher itself never retries on cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Buffered response sink: status, headers, body bytes, and the
/// output-written flag the filter pipeline short-circuits on.
#[derive(Debug, Clone)]
pub struct ResponseSink {
    status: u16,
    headers: HeaderVec,
    body: Vec<u8>,
    started: bool,
}

impl Default for ResponseSink {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HeaderVec::new(),
            body: Vec::new(),
            started: false,
        }
    }
}

impl ResponseSink {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Whether anything has been written to the body yet. This is the flag
    /// `return_on_output` filters short-circuit on; setting status or
    /// headers alone does not trip it.
    pub fn started(&self) -> bool {
        self.started
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive on the name).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.started = true;
        self.body.extend_from_slice(bytes);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Discard any partial body and headers, keeping the sink reusable.
    /// Used by the internal-error responder after a handler fault so a
    /// half-written body never reaches the client.
    pub fn reset(&mut self) {
        self.status = 200;
        self.headers.clear();
        self.body.clear();
        self.started = false;
    }
}

/// Everything one request carries through the dispatch pipeline.
#[derive(Debug)]
pub struct RequestContext {
    /// Correlation id for structured logging
    pub request_id: RequestId,
    /// HTTP method of the request
    pub method: Method,
    /// Percent-decoded request path, query string stripped
    pub path: String,
    headers: HeaderVec,
    query: ParamVec,
    body: Option<Vec<u8>>,
    params: ParamVec,
    response: ResponseSink,
    cancel: CancelToken,
    /// Effective per-request session switch, set by the dispatcher from the
    /// entry override or the global config before the handler runs.
    pub(crate) session_on: bool,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.into(),
            headers: HeaderVec::new(),
            query: ParamVec::new(),
            body: None,
            params: ParamVec::new(),
            response: ResponseSink::default(),
            cancel: CancelToken::new(),
            session_on: false,
        }
    }

    pub fn with_body(mut self, bytes: Vec<u8>) -> Self {
        self.body = Some(bytes);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    pub fn with_query_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((Arc::from(name), value.into()));
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub(crate) fn set_headers(&mut self, headers: HeaderVec) {
        self.headers = headers;
    }

    pub(crate) fn set_query(&mut self, query: ParamVec) {
        self.query = query;
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name. Last write wins for duplicates
    /// (`?limit=10&limit=20` reads as `20`).
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a resolved path parameter by name. Names are bare (`"id"`,
    /// `"splat"`, `"ext"`, `"0"`); last write wins for duplicates at
    /// different path depths.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Bind a path parameter. Appends rather than replaces, so reads see
    /// the newest value while a snapshot/restore cycle stays cheap.
    pub fn set_param(&mut self, name: &str, value: impl Into<String>) {
        self.params.push((Arc::from(name), value.into()));
    }

    pub(crate) fn extend_params(&mut self, extra: ParamVec) {
        self.params.extend(extra);
    }

    /// Snapshot of the parameter table, taken before a `reset_params`
    /// filter runs.
    pub(crate) fn params_snapshot(&self) -> ParamVec {
        self.params.clone()
    }

    /// Restore a previously taken snapshot, discarding every binding made
    /// since.
    pub(crate) fn restore_params(&mut self, snapshot: ParamVec) {
        self.params = snapshot;
    }

    pub fn params(&self) -> &ParamVec {
        &self.params
    }

    /// Raw request body bytes, if the host copied them in.
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Parse the body as JSON. `None` when there is no body or it is not
    /// valid JSON.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_slice(b).ok())
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the session accessor ran for this request.
    pub fn session_on(&self) -> bool {
        self.session_on
    }

    pub fn response(&self) -> &ResponseSink {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseSink {
        &mut self.response
    }

    /// Shorthand used throughout the pipeline.
    pub fn output_started(&self) -> bool {
        self.response.started()
    }

    pub fn set_status(&mut self, status: u16) {
        self.response.set_status(status);
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.response.set_header(name, value);
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.response.write(bytes);
    }

    pub fn write_str(&mut self, s: &str) {
        self.response.write(s.as_bytes());
    }

    /// Serialize `body` as the JSON response with the given status.
    pub fn write_json(&mut self, status: u16, body: &Value) {
        self.response.set_status(status);
        self.response
            .set_header("Content-Type", "application/json");
        let bytes = serde_json::to_vec(body).unwrap_or_default();
        self.response.write(&bytes);
    }
}
