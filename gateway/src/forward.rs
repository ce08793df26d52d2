use actix_web::error::{ErrorBadGateway, ErrorBadRequest};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use futures::StreamExt;
use serde_json::json;

use crate::ws;
use crate::ProxyTargets;

/// Hop-by-hop headers that must not cross the proxy in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Route one request to the backend or frontend origin and stream the
/// response back. WebSocket upgrades destined for the frontend are bridged
/// instead of forwarded.
pub async fn forward(
    req: HttpRequest,
    mut payload: web::Payload,
    targets: web::Data<ProxyTargets>,
    client: web::Data<reqwest::Client>,
) -> Result<HttpResponse, actix_web::Error> {
    let api = is_api_path(req.path());
    let base = if api {
        &targets.backend_url
    } else {
        &targets.frontend_url
    };

    if !api && is_websocket_upgrade(&req) {
        return ws::bridge(req, payload, base).await;
    }

    let target = build_target_url(base, req.path(), req.uri().query());

    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        body.extend_from_slice(&chunk?);
    }

    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .map_err(|e| ErrorBadRequest(format!("Invalid HTTP method: {}", e)))?;

    let upstream = client
        .request(method, &target)
        .headers(forward_request_headers(&req))
        .body(body.freeze())
        .send()
        .await;

    let upstream = match upstream {
        Ok(upstream) => upstream,
        Err(e) => {
            if api {
                log::error!("backend proxy error: {}", e);
                return Ok(HttpResponse::BadGateway()
                    .json(json!({ "error": "Backend service unavailable" })));
            }
            log::error!("frontend proxy error: {}", e);
            return Ok(HttpResponse::BadGateway().body("Frontend service unavailable"));
        }
    };

    let status = to_actix_status(upstream.status().as_u16())?;
    let mut builder = HttpResponse::build(status);
    copy_response_headers(&mut builder, upstream.headers());
    Ok(builder.streaming(upstream.bytes_stream()))
}

pub(crate) fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

pub(crate) fn is_websocket_upgrade(req: &HttpRequest) -> bool {
    let upgrade = req
        .headers()
        .get(actix_web::http::header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    let connection = req
        .headers()
        .get(actix_web::http::header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("upgrade"));
    upgrade && connection
}

/// Build the full target URL from an origin, the request path, and an
/// optional query string.
pub(crate) fn build_target_url(base: &str, path: &str, query: Option<&str>) -> String {
    let mut url = format!("{}{}", base.trim_end_matches('/'), path);
    if let Some(qs) = query {
        url.push('?');
        url.push_str(qs);
    }
    url
}

/// Copy request headers into a reqwest HeaderMap, skipping `Host` and the
/// hop-by-hop set.
fn forward_request_headers(req: &HttpRequest) -> reqwest::header::HeaderMap {
    let mut map = reqwest::header::HeaderMap::new();
    for (key, value) in req.headers() {
        let name = key.as_str();
        if name.eq_ignore_ascii_case("host") || is_hop_by_hop(name) {
            continue;
        }
        if let Ok(name) = reqwest::header::HeaderName::from_bytes(key.as_ref()) {
            if let Ok(val) = reqwest::header::HeaderValue::from_bytes(value.as_bytes()) {
                map.insert(name, val);
            }
        }
    }
    map
}

/// Copy upstream response headers into the client response, skipping the
/// hop-by-hop set.
fn copy_response_headers(builder: &mut HttpResponseBuilder, headers: &reqwest::header::HeaderMap) {
    for (key, value) in headers {
        if is_hop_by_hop(key.as_str()) {
            continue;
        }
        if let Ok(name) = actix_web::http::header::HeaderName::from_bytes(key.as_ref()) {
            if let Ok(val) = actix_web::http::header::HeaderValue::from_bytes(value.as_bytes()) {
                builder.insert_header((name, val));
            }
        }
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

fn to_actix_status(status: u16) -> Result<StatusCode, actix_web::Error> {
    StatusCode::from_u16(status)
        .map_err(|_| ErrorBadGateway(format!("Invalid status code from upstream: {}", status)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn api_paths_go_to_the_backend() {
        assert!(is_api_path("/api"));
        assert!(is_api_path("/api/health"));
        assert!(is_api_path("/api/v1/chat/completions"));
        assert!(!is_api_path("/apifoo"));
        assert!(!is_api_path("/"));
        assert!(!is_api_path("/chat/index.html"));
    }

    #[test]
    fn target_url_joins_path_and_query() {
        assert_eq!(
            build_target_url("http://localhost:5173/", "/src/main.js", None),
            "http://localhost:5173/src/main.js"
        );
        assert_eq!(
            build_target_url("http://localhost:3001", "/api/v1/chat/logs", Some("limit=5")),
            "http://localhost:3001/api/v1/chat/logs?limit=5"
        );
    }

    #[test]
    fn websocket_upgrade_requires_both_headers() {
        let req = TestRequest::default()
            .insert_header(("Upgrade", "websocket"))
            .insert_header(("Connection", "keep-alive, Upgrade"))
            .to_http_request();
        assert!(is_websocket_upgrade(&req));

        let req = TestRequest::default()
            .insert_header(("Upgrade", "websocket"))
            .to_http_request();
        assert!(!is_websocket_upgrade(&req));

        let req = TestRequest::default()
            .insert_header(("Connection", "Upgrade"))
            .to_http_request();
        assert!(!is_websocket_upgrade(&req));
    }

    #[test]
    fn hop_by_hop_headers_are_filtered() {
        assert!(is_hop_by_hop("Transfer-Encoding"));
        assert!(is_hop_by_hop("connection"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("x-session-id"));
    }
}
