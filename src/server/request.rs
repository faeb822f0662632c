//! Raw request parsing for the host adapter.

use may_minihttp::Request;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

use crate::context::{HeaderVec, ParamVec};

/// Everything extracted from a raw HTTP request before a context is built.
#[derive(Debug)]
pub struct ParsedRequest {
    /// HTTP method as received (validated later)
    pub method: String,
    /// Percent-decoded request path, query string stripped
    pub path: String,
    /// Headers with lowercased names
    pub headers: HeaderVec,
    /// Parsed query string parameters
    pub query: ParamVec,
    /// Raw body bytes, `None` when empty
    pub body: Option<Vec<u8>>,
}

/// Strip the query string and percent-decode the path. Falls back to the
/// raw text when the encoding is broken rather than failing the request.
pub fn decode_path(raw_path: &str) -> String {
    let path = raw_path.split('?').next().unwrap_or("/");
    match urlencoding::decode(path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path.to_string(),
    }
}

/// Parse query parameters from the raw path, URL-decoding names and values.
pub fn parse_query_params(raw_path: &str) -> ParamVec {
    let mut params = ParamVec::new();
    if let Some(pos) = raw_path.find('?') {
        for (key, value) in url::form_urlencoded::parse(raw_path[pos + 1..].as_bytes()) {
            params.push((Arc::from(key.as_ref()), value.into_owned()));
        }
    }
    params
}

/// Extract method, path, headers, query parameters, and body from a raw
/// `may_minihttp` request.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let path = decode_path(&raw_path);
    let query = parse_query_params(&raw_path);

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase().as_str()),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    let mut body_bytes = Vec::new();
    let body = match req.body().read_to_end(&mut body_bytes) {
        Ok(n) if n > 0 => Some(body_bytes),
        _ => None,
    };

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        body_bytes = body.as_ref().map_or(0, Vec::len),
        "request parsed"
    );

    ParsedRequest {
        method,
        path,
        headers,
        query,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_path_strips_query_and_decodes() {
        assert_eq!(
            decode_path("/search/%E4%BD%A0%E5%A5%BD?x=1"),
            "/search/你好"
        );
        assert_eq!(decode_path("/plain"), "/plain");
    }

    #[test]
    fn test_parse_query_params() {
        let q = parse_query_params("/p?x=1&y=two%20words");
        assert_eq!(q.len(), 2);
        assert_eq!(q[0].1, "1");
        assert_eq!(q[1].1, "two words");
    }

    #[test]
    fn test_no_query_yields_empty() {
        assert!(parse_query_params("/p").is_empty());
    }
}
