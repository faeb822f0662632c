//! Host server adapter: `may_minihttp` service, request parsing, response
//! flushing, and the typed server wrapper.
//!
//! The engine itself defines no wire protocol; this module is the one
//! place that knows about the host's request/response types.

pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use request::{decode_path, parse_query_params, parse_request, ParsedRequest};
pub use response::flush_response;
pub use service::RouterService;

use crate::runtime_config::RuntimeConfig;

/// Apply runtime settings to the `may` scheduler. Call once before
/// starting a server.
pub fn configure_runtime(config: &RuntimeConfig) {
    may::config().set_stack_size(config.stack_size);
}
