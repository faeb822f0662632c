//! Response flushing for the host adapter.

use may_minihttp::Response;

use crate::context::RequestContext;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Request Entity Too Large",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

/// Copy the buffered response sink out to the wire.
pub fn flush_response(res: &mut Response, ctx: &RequestContext) {
    let sink = ctx.response();
    res.status_code(sink.status() as usize, status_reason(sink.status()));
    for (name, value) in sink.headers() {
        // may_minihttp wants 'static header lines
        let line = format!("{name}: {value}").into_boxed_str();
        res.header(Box::leak(line));
    }
    if !sink.body().is_empty() {
        res.body_vec(sink.body().to_vec());
    }
}
