//! HTTP edge: translates incoming requests into worker requests and
//! worker responses back into HTTP.
//!
//! Requests carry their routing hints in the `sec-fetch-dest` and
//! `sec-fetch-mode` headers; clients that do not send them get a
//! destination inferred from the path extension and a navigation mode
//! inferred from the `accept` header. End-to-end request headers ride
//! along to the upstream fetch; hop-by-hop headers end here in both
//! directions. Absolute-form targets (forward proxy style) are taken
//! verbatim, which is how requests for the third-party font and CDN
//! hosts arrive.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use cachefront_client::canonicalize;
use cachefront_core::request::{Destination, RequestMode, WorkerRequest};
use cachefront_core::response::WorkerResponse;
use url::Url;

use crate::worker::Worker;

const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Headers never replayed from a cached or fetched response. The body is
/// already decompressed and re-framed, and content-type is carried
/// separately on the response.
const STRIPPED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
    "content-encoding",
    "content-type",
];

/// Headers never forwarded upstream: hop-by-hop headers end at this hop,
/// and host, content-length and accept-encoding are set by the fetch
/// client itself.
const UNFORWARDED_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "accept-encoding",
];

/// Every path and method lands in the same handler; routing happens in
/// the worker, not here.
pub fn router(worker: Arc<Worker>) -> Router {
    Router::new().fallback(handle).with_state(worker)
}

async fn handle(State(worker): State<Arc<Worker>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
        Ok(body) => body,
        Err(_) => return status_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"),
    };

    let url = match target_url(worker.origin(), &parts.uri) {
        Some(url) => url,
        None => {
            tracing::debug!(uri = %parts.uri, "unsupported request target");
            return status_response(StatusCode::BAD_REQUEST, "unsupported request target");
        }
    };

    let destination = match header_str(&parts, "sec-fetch-dest") {
        Some(value) => Destination::parse(value),
        None => infer_destination(url.path()),
    };
    let mode = match header_str(&parts, "sec-fetch-mode") {
        Some(value) => RequestMode::parse(value),
        None if header_str(&parts, "accept").is_some_and(|accept| accept.contains("text/html")) => RequestMode::Navigate,
        None => RequestMode::NoCors,
    };

    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            let name = name.as_str().to_ascii_lowercase();
            if UNFORWARDED_HEADERS.contains(&name.as_str()) {
                return None;
            }
            value.to_str().ok().map(|value| (name, value.to_string()))
        })
        .collect();

    let worker_request = WorkerRequest::get(url)
        .with_method(parts.method.as_str())
        .with_destination(destination)
        .with_mode(mode)
        .with_headers(headers)
        .with_body(body);

    match worker.handle(&worker_request).await {
        Ok(response) => into_http_response(response),
        Err(err) => {
            tracing::warn!(url = %worker_request.url, error = %err, "request failed");
            status_response(StatusCode::BAD_GATEWAY, "upstream fetch failed")
        }
    }
}

/// Resolve the request target against the configured origin. Origin-form
/// targets join onto the origin; absolute-form targets stand alone.
fn target_url(origin: &Url, uri: &Uri) -> Option<Url> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        canonicalize(&uri.to_string()).ok()
    } else {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        origin.join(path_and_query).ok()
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

/// Destination fallback for clients without `sec-fetch-dest`, keyed off
/// the path extension.
fn infer_destination(path: &str) -> Destination {
    let Some((_, ext)) = path.rsplit_once('.') else {
        return Destination::Other;
    };
    match ext.to_ascii_lowercase().as_str() {
        "css" => Destination::Style,
        "js" | "mjs" => Destination::Script,
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "svg" | "ico" => Destination::Image,
        "woff" | "woff2" | "ttf" | "otf" => Destination::Font,
        "html" | "htm" => Destination::Document,
        _ => Destination::Other,
    }
}

fn into_http_response(response: WorkerResponse) -> Response {
    // opaque responses keep their body but leave as a regular 200
    let status = if response.is_opaque() {
        StatusCode::OK
    } else {
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK)
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        if STRIPPED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        if let Ok(name) = HeaderName::try_from(name.as_str())
            && let Ok(value) = HeaderValue::try_from(value.as_str())
        {
            builder = builder.header(name, value);
        }
    }
    if let Some(content_type) = &response.content_type
        && let Ok(value) = HeaderValue::try_from(content_type.as_str())
    {
        builder = builder.header(header::CONTENT_TYPE, value);
    }
    builder = builder.header("x-cache", response.source.as_str());

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| status_response(StatusCode::INTERNAL_SERVER_ERROR, "response build failed"))
}

fn status_response(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}
