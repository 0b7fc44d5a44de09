//! Endpoint handlers
//!
//! `/test` answers with a fixed string, `/headers` echoes the request headers as JSON.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::HeaderMap;
use hyper::Response;
use serde_json::{Map, Value};

use super::router::RequestContext;
use crate::http;
use crate::logger;

/// Body of the `/test` endpoint
pub const TEST_BODY: &str = "HELLO TEST";

/// `GET /test`: ignores the request entirely
pub fn serve_test(ctx: &RequestContext) -> Response<Full<Bytes>> {
    respond(Bytes::from_static(TEST_BODY.as_bytes()), http::TEXT_PLAIN, ctx)
}

/// `GET /headers`: every received header, serialized as a JSON object
pub fn serve_headers(headers: &HeaderMap, ctx: &RequestContext) -> Response<Full<Bytes>> {
    match serde_json::to_vec(&headers_to_json(headers)) {
        Ok(body) => respond(Bytes::from(body), http::APPLICATION_JSON, ctx),
        Err(e) => {
            logger::log_error(&format!("Failed to serialize request headers: {e}"));
            http::build_500_response()
        }
    }
}

/// Convert a header map into a JSON object
///
/// Names come out lower-cased (hyper normalizes them on parse). A header
/// seen once maps to a string, a repeated header to an array of its values
/// in arrival order.
pub fn headers_to_json(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .keys()
        .map(|name| {
            let mut values: Vec<Value> = headers
                .get_all(name)
                .iter()
                .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
                .collect();

            let value = if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}

/// Attach an `ETag` and answer 304 when the client copy is still fresh
fn respond(data: Bytes, content_type: &str, ctx: &RequestContext) -> Response<Full<Bytes>> {
    let etag = http::generate_etag(&data);
    if http::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
        return http::build_304_response(&etag);
    }
    http::build_ok_response(data, content_type, &etag, ctx.is_head)
}
