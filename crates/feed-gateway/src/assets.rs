//! Demo page and embeddable widget script.
//!
//! Both templates are compiled in and have `__BASE_URL__` replaced with the
//! origin the request was addressed to.

use axum::{
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Response},
};

pub const BASE_URL_PLACEHOLDER: &str = "__BASE_URL__";

const DEMO_HTML: &str = include_str!("../static/demo.html");
const WIDGET_JS: &str = include_str!("../static/widget.js");

const FALLBACK_HOST: &str = "localhost";

/// `GET /`
pub async fn demo_page(headers: HeaderMap) -> Html<String> {
    Html(render(DEMO_HTML, &request_base_url(&headers)))
}

/// `GET /widget.js`
pub async fn widget_script(headers: HeaderMap) -> Response {
    let body = render(WIDGET_JS, &request_base_url(&headers));
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/javascript; charset=utf-8"),
            ),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            ),
        ],
        body,
    )
        .into_response()
}

fn render(template: &str, base_url: &str) -> String {
    template.replace(BASE_URL_PLACEHOLDER, base_url)
}

/// Rebuild `scheme://host[:port]` from `X-Forwarded-Proto` and `Host`.
///
/// Values end up inside HTML and JavaScript, so anything outside the
/// expected character set falls back to a safe default.
pub fn request_base_url(headers: &HeaderMap) -> String {
    let scheme = match headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("https") => "https",
        _ => "http",
    };

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|h| is_safe_host(h))
        .unwrap_or(FALLBACK_HOST);

    format!("{}://{}", scheme, host)
}

fn is_safe_host(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 255
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
}
