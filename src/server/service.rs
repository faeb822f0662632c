//! The `HttpService` gluing the host server to the dispatcher.

use may_minihttp::{HttpService, Request, Response};
use serde_json::json;
use std::io;
use std::sync::Arc;

use super::request::parse_request;
use super::response::flush_response;
use crate::context::RequestContext;
use crate::dispatcher::Dispatcher;
use crate::ids::RequestId;

/// Per-connection service: parses the raw request into a context, runs the
/// dispatcher, and flushes the buffered response. Cloned by the server for
/// each worker; the dispatcher and its frozen registry are shared.
#[derive(Clone)]
pub struct RouterService {
    dispatcher: Arc<Dispatcher>,
}

impl RouterService {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl HttpService for RouterService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let parsed = parse_request(req);

        let method: http::Method = match parsed.method.parse() {
            Ok(m) => m,
            Err(_) => {
                let mut ctx = RequestContext::new(http::Method::GET, parsed.path);
                ctx.write_json(405, &json!({ "error": "Method Not Allowed" }));
                flush_response(res, &ctx);
                return Ok(());
            }
        };

        let request_id = RequestId::from_header_or_new(
            parsed
                .headers
                .iter()
                .find(|(k, _)| k.as_ref() == "x-request-id")
                .map(|(_, v)| v.as_str()),
        );

        let mut ctx = RequestContext::new(method, parsed.path);
        ctx.request_id = request_id;
        ctx.set_headers(parsed.headers);
        ctx.set_query(parsed.query);
        if let Some(body) = parsed.body {
            ctx = ctx.with_body(body);
        }

        self.dispatcher.dispatch(&mut ctx);
        flush_response(res, &ctx);
        Ok(())
    }
}
