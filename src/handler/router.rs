//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route matching, dispatching and access logging.

use crate::config::AppState;
use crate::handler::endpoints;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// The fixed routing table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Test,
    Headers,
}

const ROUTES: [(&str, Route); 2] = [("/test", Route::Test), ("/headers", Route::Headers)];

/// Request context encapsulating information needed by the handlers
pub struct RequestContext {
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Main entry point for HTTP request handling
///
/// The request body is never read, so any body type is accepted.
pub fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let method = req.method();
    let path = req.uri().path();

    let ctx = RequestContext {
        is_head: *method == Method::HEAD,
        if_none_match: header_string(&req, "if-none-match"),
    };

    let response = match match_route(method, path) {
        Some(Route::Test) => endpoints::serve_test(&ctx),
        Some(Route::Headers) => endpoints::serve_headers(req.headers(), &ctx),
        None => http::build_404_response(method, path),
    };

    if state.access_log_enabled() {
        let entry = build_access_entry(&req, &response, peer_addr, started);
        logger::log_access(&entry, state.access_log_format());
    }

    Ok(response)
}

/// Collect the access log fields for a served request
fn build_access_entry<B>(
    req: &Request<B>,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr,
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version());
    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
    entry.referer = header_string(req, "referer");
    entry.user_agent = header_string(req, "user-agent");
    entry.client_cert = header_string(req, "x-forwarded-client-cert");
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

/// Select the handler for a method/path pair
///
/// Only GET and HEAD are routed. Paths compare ASCII case-insensitively
/// and a single trailing slash is ignored.
pub fn match_route(method: &Method, path: &str) -> Option<Route> {
    if *method != Method::GET && *method != Method::HEAD {
        return None;
    }

    let path = normalize_path(path);
    ROUTES
        .iter()
        .find(|(route_path, _)| route_path.eq_ignore_ascii_case(path))
        .map(|(_, route)| *route)
}

fn normalize_path(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

fn header_string<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn version_label(version: hyper::Version) -> String {
    let label = format!("{version:?}");
    label.strip_prefix("HTTP/").unwrap_or(&label).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn send(req: Request<()>) -> (Response<Full<Bytes>>, Bytes) {
        let resp = handle_request(req, Arc::new(AppState::default()), peer()).unwrap();
        let (parts, body) = resp.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        (Response::from_parts(parts, Full::new(bytes.clone())), bytes)
    }

    fn get(path: &str) -> hyper::http::request::Builder {
        Request::builder().method(Method::GET).uri(path)
    }

    #[test]
    fn test_match_route() {
        assert_eq!(match_route(&Method::GET, "/test"), Some(Route::Test));
        assert_eq!(match_route(&Method::GET, "/headers"), Some(Route::Headers));
        assert_eq!(match_route(&Method::HEAD, "/test"), Some(Route::Test));
        assert_eq!(match_route(&Method::GET, "/"), None);
        assert_eq!(match_route(&Method::GET, "/test/extra"), None);
        assert_eq!(match_route(&Method::GET, "/testing"), None);
    }

    #[test]
    fn test_match_route_rejects_other_methods() {
        for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH, Method::OPTIONS] {
            assert_eq!(match_route(&method, "/test"), None);
            assert_eq!(match_route(&method, "/headers"), None);
        }
    }

    #[test]
    fn test_match_route_is_lenient_on_case_and_trailing_slash() {
        assert_eq!(match_route(&Method::GET, "/TEST"), Some(Route::Test));
        assert_eq!(match_route(&Method::GET, "/test/"), Some(Route::Test));
        assert_eq!(match_route(&Method::GET, "/Headers/"), Some(Route::Headers));
        assert_eq!(match_route(&Method::GET, "/test//"), None);
    }

    #[test]
    fn test_version_label() {
        assert_eq!(version_label(hyper::Version::HTTP_11), "1.1");
        assert_eq!(version_label(hyper::Version::HTTP_10), "1.0");
    }

    #[tokio::test]
    async fn test_get_test_returns_hello() {
        let (resp, body) = send(get("/test").header("x-anything", "ignored").body(()).unwrap()).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], http::TEXT_PLAIN);
        assert_eq!(&body[..], b"HELLO TEST");
    }

    #[tokio::test]
    async fn test_get_test_ignores_query_string() {
        let (resp, body) = send(get("/test?x=1").body(()).unwrap()).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(&body[..], b"HELLO TEST");
    }

    #[tokio::test]
    async fn test_get_headers_echoes_every_header() {
        let req = get("/headers")
            .header("X-Custom", "abc")
            .header("accept", "*/*")
            .header("x-multi", "one")
            .header("x-multi", "two")
            .body(())
            .unwrap();
        let (resp, body) = send(req).await;

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], http::APPLICATION_JSON);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["x-custom"], "abc");
        assert_eq!(obj["accept"], "*/*");
        assert_eq!(obj["x-multi"], serde_json::json!(["one", "two"]));
    }

    #[tokio::test]
    async fn test_post_test_is_not_found() {
        let req = Request::builder().method(Method::POST).uri("/test").body(()).unwrap();
        let (resp, body) = send(req).await;
        assert_eq!(resp.status(), 404);
        assert_eq!(&body[..], b"Cannot POST /test");
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let (resp, body) = send(get("/nope").body(()).unwrap()).await;
        assert_eq!(resp.status(), 404);
        assert_eq!(&body[..], b"Cannot GET /nope");
    }

    #[tokio::test]
    async fn test_head_test_has_no_body() {
        let req = Request::builder().method(Method::HEAD).uri("/test").body(()).unwrap();
        let (resp, body) = send(req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-length"], "10");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_requests_are_identical() {
        let (first, first_body) = send(get("/test").body(()).unwrap()).await;
        let (second, second_body) = send(get("/test").body(()).unwrap()).await;
        assert_eq!(first.status(), second.status());
        assert_eq!(first.headers(), second.headers());
        assert_eq!(first_body, second_body);
    }

    #[tokio::test]
    async fn test_matching_if_none_match_returns_304() {
        let (first, _) = send(get("/test").body(()).unwrap()).await;
        let etag = first.headers()["etag"].to_str().unwrap().to_string();

        let (resp, body) = send(get("/test").header("If-None-Match", etag).body(()).unwrap()).await;
        assert_eq!(resp.status(), 304);
        assert!(body.is_empty());
    }

    #[test]
    fn test_access_entry_describes_request_and_response() {
        let req = get("/headers?verbose=1")
            .header("user-agent", "curl/8.5.0")
            .header("x-forwarded-client-cert", "By=spiffe://cluster.local/ns/default/sa/web")
            .body(())
            .unwrap();
        let resp = http::build_404_response(&Method::GET, "/headers");

        let entry = build_access_entry(&req, &resp, peer(), Instant::now());
        assert_eq!(entry.method, "GET");
        assert_eq!(entry.path, "/headers");
        assert_eq!(entry.query.as_deref(), Some("verbose=1"));
        assert_eq!(entry.http_version, "1.1");
        assert_eq!(entry.status, 404);
        assert_eq!(entry.body_bytes, 19);
        assert!(entry.referer.is_none());

        let line = entry.format("$remote_addr $request $status $body_bytes_sent $http_user_agent $http_x_forwarded_client_cert");
        assert_eq!(
            line,
            "127.0.0.1 GET /headers?verbose=1 HTTP/1.1 404 19 curl/8.5.0 By=spiffe://cluster.local/ns/default/sa/web"
        );
    }

    #[test]
    fn test_access_log_enabled_keeps_response() {
        let mut cfg = crate::config::Config::default();
        cfg.logging.access_log = true;
        cfg.logging.access_log_format = "json".to_string();
        let state = Arc::new(AppState::new(&cfg));

        let req = get("/test").body(()).unwrap();
        let resp = handle_request(req, state, peer()).unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-length"], "10");
    }

    fn headers_request(method: Method) -> Request<()> {
        Request::builder()
            .method(method)
            .uri("/headers")
            .header("host", "web.default.svc:8001")
            .header("x-custom", "abc")
            .header("x-b3-traceid", "463ac35c9f6413ad")
            .body(())
            .unwrap()
    }

    #[tokio::test]
    async fn test_repeated_headers_requests_are_identical() {
        let (first, first_body) = send(headers_request(Method::GET)).await;
        let (second, second_body) = send(headers_request(Method::GET)).await;
        assert_eq!(first.status(), 200);
        assert_eq!(first.status(), second.status());
        assert_eq!(first.headers()["etag"], second.headers()["etag"]);
        assert_eq!(first.headers(), second.headers());
        assert_eq!(first_body, second_body);
    }

    #[tokio::test]
    async fn test_head_headers_has_no_body() {
        let (get_resp, get_body) = send(headers_request(Method::GET)).await;
        let (head_resp, head_body) = send(headers_request(Method::HEAD)).await;

        assert_eq!(head_resp.status(), 200);
        assert!(head_body.is_empty());
        assert_eq!(
            head_resp.headers()["content-length"],
            get_body.len().to_string().as_str()
        );
        assert_eq!(head_resp.headers()["etag"], get_resp.headers()["etag"]);
        assert_eq!(head_resp.headers()["content-type"], http::APPLICATION_JSON);
    }

    #[tokio::test]
    async fn test_headers_wildcard_if_none_match_returns_304() {
        let mut req = headers_request(Method::GET);
        req.headers_mut()
            .insert("if-none-match", hyper::header::HeaderValue::from_static("*"));
        let (resp, body) = send(req).await;

        assert_eq!(resp.status(), 304);
        assert!(resp.headers().contains_key("etag"));
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_headers_etag_covers_echoed_if_none_match() {
        // The conditional header is echoed in the body, so the tag a client
        // got before sending it cannot match the new representation
        let (first, _) = send(headers_request(Method::GET)).await;
        let etag = first.headers()["etag"].clone();

        let mut req = headers_request(Method::GET);
        req.headers_mut().insert("if-none-match", etag.clone());
        let (resp, body) = send(req).await;

        assert_eq!(resp.status(), 200);
        assert_ne!(resp.headers()["etag"], etag);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["if-none-match"], etag.to_str().unwrap());
    }

    #[tokio::test]
    async fn test_stale_if_none_match_returns_200() {
        let req = get("/test").header("If-None-Match", "W/\"0-0\"").body(()).unwrap();
        let (resp, body) = send(req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(&body[..], b"HELLO TEST");
    }
}
