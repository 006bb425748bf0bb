//! Response assembly for nanoPortal
//!
//! A [`Response`] collects the status, headers, cache validators and body of
//! a single request, decides whether the client's cached copy is still good
//! (conditional GET), and is finally turned into an [`HttpResponse`].
//!
//! The status defaults to `404 Not Found`: a code path that never declares
//! success produces a "not found" response rather than an accidental 200.
//!
//! # Conditional GET
//!
//! ```rust
//! use nanoportal_core::{Request, RequestType, Response};
//!
//! let request = Request::for_path(RequestType::Get, "/feed")
//!     .with_header("If-None-Match", "\"v42\"");
//!
//! let mut response = Response::for_request(&request);
//! response.set_etag("\"v42\"");
//!
//! // Checked before any expensive rendering happens.
//! let head = response.not_modified().expect("client copy is fresh");
//! assert_eq!(head.status().as_u16(), 304);
//! ```

use crate::compression::{self, AcceptedEncoding};
use crate::error::{Environment, PortalError, Result};
use crate::output::Output;
use crate::request::Request;
use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// HTTP response handed to the transport
pub type HttpResponse = http::Response<Full<Bytes>>;

/// Gzip level used for output compression
const COMPRESSION_LEVEL: u32 = 6;

/// A `Last-Modified` value as supplied by application code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastModified {
    /// Seconds since the Unix epoch
    Timestamp(u64),
    /// An already formatted HTTP date
    Formatted(String),
}

impl From<u64> for LastModified {
    fn from(value: u64) -> Self {
        Self::Timestamp(value)
    }
}

/// A `Cache-Control` lifetime in whole seconds.
///
/// Fractions are truncated; negative or non-finite values become zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxAge(pub u64);

impl From<u64> for MaxAge {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<u32> for MaxAge {
    fn from(value: u32) -> Self {
        Self(u64::from(value))
    }
}

impl From<i64> for MaxAge {
    fn from(value: i64) -> Self {
        Self(value.max(0) as u64)
    }
}

impl From<i32> for MaxAge {
    fn from(value: i32) -> Self {
        Self(value.max(0) as u64)
    }
}

impl From<f64> for MaxAge {
    fn from(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value.trunc() as u64)
        } else {
            Self(0)
        }
    }
}

impl From<Duration> for MaxAge {
    fn from(value: Duration) -> Self {
        Self(value.as_secs())
    }
}

impl From<SystemTime> for LastModified {
    fn from(value: SystemTime) -> Self {
        Self::Timestamp(unix_seconds(value))
    }
}

impl From<&str> for LastModified {
    fn from(value: &str) -> Self {
        Self::Formatted(value.to_string())
    }
}

impl From<String> for LastModified {
    fn from(value: String) -> Self {
        Self::Formatted(value)
    }
}

enum Content {
    Empty,
    Raw(Bytes),
    Deferred(Box<dyn Output>),
}

/// Status, headers, validators and body of one request's reply.
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    content: Content,
    last_modified: Option<u64>,
    etag: Option<String>,
    headers_sent: bool,
    compression_min_size: Option<usize>,
    if_modified_since: Option<String>,
    if_none_match: Option<String>,
    accept_encoding: Option<String>,
}

impl Response {
    /// Create a response that knows nothing about the request.
    ///
    /// Conditional GET never matches and compression is never negotiated.
    pub fn new() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            headers: Vec::new(),
            content: Content::Empty,
            last_modified: None,
            etag: None,
            headers_sent: false,
            compression_min_size: None,
            if_modified_since: None,
            if_none_match: None,
            accept_encoding: None,
        }
    }

    /// Create a response bound to the request's conditional and
    /// `Accept-Encoding` headers.
    pub fn for_request(request: &Request) -> Self {
        Self {
            if_modified_since: request.header("If-Modified-Since").map(str::to_string),
            if_none_match: request.header("If-None-Match").map(str::to_string),
            accept_encoding: request.header("Accept-Encoding").map(str::to_string),
            ..Self::new()
        }
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Set the status code. Values outside 100-999 are ignored.
    pub fn set_response_code(&mut self, code: u16) {
        if self.is_sent("status") {
            return;
        }
        match StatusCode::from_u16(code) {
            Ok(status) => self.status = status,
            Err(_) => warn!(code, "Ignoring invalid response code"),
        }
    }

    /// Get the status code
    pub fn response_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Get the status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    // ------------------------------------------------------------------
    // Headers
    // ------------------------------------------------------------------

    /// Set a header. The last write wins but keeps the position of the
    /// first write. No effect once headers have been sent.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        if self.is_sent(name) {
            return;
        }
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    /// Remove a header. No effect once headers have been sent.
    pub fn remove_header(&mut self, name: &str) {
        if self.is_sent(name) {
            return;
        }
        self.headers
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    }

    /// Get a header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Headers in emission order
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Set the `Content-Type` header
    pub fn set_content_type(&mut self, content_type: &str) {
        self.set_header("Content-Type", content_type);
    }

    /// Mark headers as emitted. Later header changes are ignored.
    ///
    /// Returns `false` (and logs) if they were already sent.
    pub fn send_headers(&mut self) -> bool {
        if self.headers_sent {
            warn!("Headers already sent");
            return false;
        }
        debug!(status = self.status.as_u16(), headers = self.headers.len(), "Sending headers");
        self.headers_sent = true;
        true
    }

    /// Whether headers have been emitted
    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    fn is_sent(&self, what: &str) -> bool {
        if self.headers_sent {
            warn!(header = what, "Headers already sent; change ignored");
        }
        self.headers_sent
    }

    // ------------------------------------------------------------------
    // Body
    // ------------------------------------------------------------------

    /// Use a raw body
    pub fn set_content(&mut self, content: impl Into<Bytes>) {
        self.content = Content::Raw(content.into());
    }

    /// Use a self-rendering output; it is rendered only when needed
    pub fn set_output<O: Output + 'static>(&mut self, output: O) {
        self.set_boxed_output(Box::new(output));
    }

    /// Use an already boxed output
    pub fn set_boxed_output(&mut self, output: Box<dyn Output>) {
        self.content = Content::Deferred(output);
    }

    /// Render the body
    pub fn content(&self) -> Result<Bytes> {
        match &self.content {
            Content::Empty => Ok(Bytes::new()),
            Content::Raw(bytes) => Ok(bytes.clone()),
            Content::Deferred(output) => output.render(),
        }
    }

    /// Whether any body has been set
    pub fn has_content(&self) -> bool {
        !matches!(self.content, Content::Empty)
    }

    // ------------------------------------------------------------------
    // Cache validators
    // ------------------------------------------------------------------

    /// Set the last modification time and the `Last-Modified` header.
    ///
    /// Formatted values that are not valid HTTP dates are ignored.
    pub fn set_last_modified(&mut self, value: impl Into<LastModified>) {
        if self.is_sent("Last-Modified") {
            return;
        }
        let timestamp = match value.into() {
            LastModified::Timestamp(ts) => ts,
            LastModified::Formatted(text) => match httpdate::parse_http_date(&text) {
                Ok(time) => unix_seconds(time),
                Err(err) => {
                    warn!(value = %text, error = %err, "Ignoring unparsable Last-Modified");
                    return;
                }
            },
        };
        self.last_modified = Some(timestamp);
        self.set_header("Last-Modified", format_http_date(timestamp));
    }

    /// Last modification time in seconds since the epoch
    pub fn last_modified(&self) -> Option<u64> {
        self.last_modified
    }

    /// Last modification time as an HTTP date
    pub fn last_modified_http(&self) -> Option<String> {
        self.last_modified.map(format_http_date)
    }

    /// Set the entity tag and the `ETag` header
    pub fn set_etag(&mut self, etag: impl Into<String>) {
        if self.is_sent("ETag") {
            return;
        }
        let etag = etag.into();
        self.set_header("ETag", etag.clone());
        self.etag = Some(etag);
    }

    /// Entity tag, if set
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Emit `Cache-Control: public, max-age=<n>` and a matching `Expires`.
    ///
    /// See [`MaxAge`] for how fractional and negative values are coerced.
    pub fn set_cache_duration(&mut self, seconds: impl Into<MaxAge>) {
        let MaxAge(max_age) = seconds.into();
        self.set_header("Cache-Control", format!("public, max-age={max_age}"));
        let expires = SystemTime::now() + Duration::from_secs(max_age);
        self.set_header("Expires", httpdate::fmt_http_date(expires));
    }

    /// True iff a last-modified time is set, the request sent a parsable
    /// `If-Modified-Since`, and that date is not older than ours.
    pub fn is_not_modified_since(&self) -> bool {
        let (Some(ours), Some(theirs)) = (self.last_modified, self.if_modified_since.as_deref())
        else {
            return false;
        };
        match httpdate::parse_http_date(theirs.trim()) {
            Ok(since) => unix_seconds(since) >= ours,
            Err(_) => false,
        }
    }

    /// True iff an entity tag is set and equals `If-None-Match` exactly
    pub fn if_none_match(&self) -> bool {
        match (&self.etag, &self.if_none_match) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => false,
        }
    }

    /// Either conditional-GET check passes
    pub fn is_not_modified(&self) -> bool {
        self.is_not_modified_since() || self.if_none_match()
    }

    /// Conditional-GET gate.
    ///
    /// If the client's copy is fresh, switch to `304 Not Modified`, drop the
    /// body, send the headers and return the finished head. The caller must
    /// stop processing the request. Otherwise returns `None` untouched.
    pub fn not_modified(&mut self) -> Option<HttpResponse> {
        if !self.is_not_modified() {
            return None;
        }
        debug!(
            etag = ?self.etag,
            last_modified = ?self.last_modified,
            "Client copy is fresh"
        );
        self.set_response_code(StatusCode::NOT_MODIFIED.as_u16());
        self.content = Content::Empty;
        self.send_headers();
        Some(self.build(Bytes::new()))
    }

    // ------------------------------------------------------------------
    // Compression
    // ------------------------------------------------------------------

    /// Negotiate gzip from the request's `Accept-Encoding`
    pub fn accepted_encoding(&self) -> AcceptedEncoding {
        self.accept_encoding
            .as_deref()
            .map(AcceptedEncoding::negotiate)
            .unwrap_or(AcceptedEncoding::Identity)
    }

    /// Compress bodies of at least `min_size` bytes when negotiated
    pub fn enable_compression(&mut self, min_size: usize) {
        self.compression_min_size = Some(min_size);
    }

    // ------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------

    /// Render the body, apply compression and build the final response.
    ///
    /// Once headers are sent the body goes out as rendered, so it always
    /// matches the headers the client already has.
    pub fn finish(mut self) -> Result<HttpResponse> {
        let mut body = self.content()?;
        if self.headers_sent {
            return Ok(self.build(body));
        }

        if let Content::Deferred(output) = &self.content {
            if self.header("Content-Type").is_none() {
                let content_type = output.content_type().to_string();
                self.set_content_type(&content_type);
            }
        }

        if let Some(min_size) = self.compression_min_size {
            self.set_header("Vary", "Accept-Encoding");
            let encoding = self.accepted_encoding();
            let compressible = self
                .header("Content-Type")
                .map(compression::is_compressible)
                .unwrap_or(false);
            if let (Some(alias), true) = (encoding.content_encoding(), compressible) {
                if body.len() >= min_size && self.header("Content-Encoding").is_none() {
                    let compressed = compression::gzip(&body, COMPRESSION_LEVEL)?;
                    if compressed.len() < body.len() {
                        body = Bytes::from(compressed);
                        self.set_header("Content-Encoding", alias);
                    }
                }
            }
        }

        self.send_headers();
        Ok(self.build(body))
    }

    fn build(&self, body: Bytes) -> HttpResponse {
        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Dropping invalid header"),
            }
        }
        response
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("last_modified", &self.last_modified)
            .field("etag", &self.etag)
            .field("headers_sent", &self.headers_sent)
            .finish()
    }
}

/// Build the JSON reply for an error
pub fn error_response(err: &PortalError, environment: &Environment) -> HttpResponse {
    let mut response = http::Response::new(Full::new(Bytes::from(err.to_body(environment))));
    *response.status_mut() = err.status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn format_http_date(timestamp: u64) -> String {
    httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_secs(timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{HtmlOutput, JsonOutput};
    use crate::request::RequestType;
    use http_body_util::BodyExt;
    use serde_json::json;

    const T: u64 = 1_700_000_000;

    fn request() -> Request {
        Request::for_path(RequestType::Get, "/")
    }

    async fn body_bytes(response: HttpResponse) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[test]
    fn test_default_code_is_404() {
        let mut response = Response::new();
        assert_eq!(response.response_code(), 404);
        response.set_response_code(200);
        assert_eq!(response.response_code(), 200);
        response.set_response_code(42);
        assert_eq!(response.response_code(), 200);
    }

    #[test]
    fn test_headers_last_write_wins_in_place() {
        let mut response = Response::new();
        response.set_header("X-First", "1");
        response.set_header("X-Second", "2");
        response.set_header("x-first", "3");

        let headers: Vec<_> = response.headers().collect();
        assert_eq!(headers, vec![("X-First", "3"), ("X-Second", "2")]);

        response.remove_header("X-FIRST");
        assert_eq!(response.header("x-first"), None);
    }

    #[test]
    fn test_headers_frozen_after_send() {
        let mut response = Response::new();
        response.set_header("X-Before", "yes");
        assert!(response.send_headers());
        assert!(!response.send_headers());

        response.set_header("X-After", "yes");
        response.set_response_code(200);
        response.set_etag("\"late\"");

        assert!(response.headers_sent());
        assert_eq!(response.header("X-After"), None);
        assert_eq!(response.response_code(), 404);
        assert_eq!(response.etag(), None);
    }

    #[test]
    fn test_cache_duration_header() {
        let mut response = Response::new();
        response.set_cache_duration(604800);
        assert_eq!(response.header("Cache-Control"), Some("public, max-age=604800"));
        assert!(response.header("Expires").is_some());

        response.set_cache_duration(90.9);
        assert_eq!(response.header("Cache-Control"), Some("public, max-age=90"));

        response.set_cache_duration(-5);
        assert_eq!(response.header("Cache-Control"), Some("public, max-age=0"));
    }

    #[test]
    fn test_last_modified_accepts_timestamp_and_date() {
        let mut response = Response::new();
        response.set_last_modified(T);
        assert_eq!(response.last_modified(), Some(T));
        let formatted = response.last_modified_http().unwrap();
        assert_eq!(response.header("Last-Modified"), Some(formatted.as_str()));

        let mut other = Response::new();
        other.set_last_modified(formatted.as_str());
        assert_eq!(other.last_modified(), Some(T));

        let mut bad = Response::new();
        bad.set_last_modified("yesterday-ish");
        assert_eq!(bad.last_modified(), None);
        assert_eq!(bad.header("Last-Modified"), None);
    }

    #[test]
    fn test_not_modified_since() {
        let header_at = |ts: u64| {
            let req = request().with_header("If-Modified-Since", format_http_date(ts));
            let mut response = Response::for_request(&req);
            response.set_last_modified(T);
            response.is_not_modified_since()
        };

        assert!(header_at(T));
        assert!(header_at(T + 60));
        assert!(!header_at(T - 1));
    }

    #[test]
    fn test_not_modified_since_unparsable_header() {
        let req = request().with_header("If-Modified-Since", "not a date");
        let mut response = Response::for_request(&req);
        response.set_last_modified(T);
        assert!(!response.is_not_modified_since());
    }

    #[test]
    fn test_not_modified_since_requires_last_modified() {
        let req = request().with_header("If-Modified-Since", format_http_date(T));
        let response = Response::for_request(&req);
        assert!(!response.is_not_modified_since());
    }

    #[test]
    fn test_etag_exact_match() {
        let matches = |header: &str| {
            let req = request().with_header("If-None-Match", header);
            let mut response = Response::for_request(&req);
            response.set_etag("abc");
            response.if_none_match()
        };

        assert!(matches("abc"));
        assert!(!matches("ABC"));
        assert!(!matches("W/abc"));
        assert!(!Response::for_request(&request().with_header("If-None-Match", "abc")).if_none_match());
    }

    #[tokio::test]
    async fn test_not_modified_short_circuit() {
        let req = request().with_header("If-None-Match", "\"v1\"");
        let mut response = Response::for_request(&req);
        response.set_response_code(200);
        response.set_etag("\"v1\"");
        response.set_output(HtmlOutput("<h1>expensive</h1>".into()));

        let head = response.not_modified().unwrap();
        assert_eq!(head.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(head.headers()["etag"], "\"v1\"");
        assert!(response.headers_sent());
        assert!(!response.has_content());
        assert!(body_bytes(head).await.is_empty());
    }

    #[test]
    fn test_not_modified_leaves_stale_response_alone() {
        let req = request().with_header("If-None-Match", "\"v1\"");
        let mut response = Response::for_request(&req);
        response.set_etag("\"v2\"");
        assert!(response.not_modified().is_none());
        assert!(!response.headers_sent());
    }

    #[tokio::test]
    async fn test_finish_uses_output_content_type() {
        let mut response = Response::new();
        response.set_response_code(200);
        response.set_output(JsonOutput(json!({"ok": true})));

        let http = response.finish().unwrap();
        assert_eq!(http.status(), StatusCode::OK);
        assert_eq!(http.headers()["content-type"], "application/json");
        assert_eq!(body_bytes(http).await, Bytes::from_static(br#"{"ok":true}"#));
    }

    #[tokio::test]
    async fn test_finish_compresses_when_negotiated() {
        let req = request().with_header("Accept-Encoding", "x-gzip");
        let mut response = Response::for_request(&req);
        response.set_response_code(200);
        response.enable_compression(16);
        response.set_output(HtmlOutput("<p>nano</p>".repeat(50)));

        assert_eq!(response.accepted_encoding(), AcceptedEncoding::Gzip { alias: "x-gzip" });
        let http = response.finish().unwrap();
        assert_eq!(http.headers()["content-encoding"], "x-gzip");
        assert_eq!(http.headers()["vary"], "Accept-Encoding");
        let body = body_bytes(http).await;
        assert_eq!(&body[..2], &[0x1f, 0x8b]);
    }

    #[tokio::test]
    async fn test_finish_skips_small_or_binary_bodies() {
        let req = request().with_header("Accept-Encoding", "gzip, deflate");
        let mut response = Response::for_request(&req);
        response.enable_compression(1024);
        response.set_output(HtmlOutput("tiny".into()));
        let http = response.finish().unwrap();
        assert!(http.headers().get("content-encoding").is_none());

        let mut response = Response::for_request(&req);
        response.enable_compression(0);
        response.set_content_type("image/png");
        response.set_content(vec![0u8; 4096]);
        let http = response.finish().unwrap();
        assert!(http.headers().get("content-encoding").is_none());
    }

    #[tokio::test]
    async fn test_finish_after_send_keeps_body_plain() {
        let req = request().with_header("Accept-Encoding", "gzip");
        let mut response = Response::for_request(&req);
        response.set_response_code(200);
        response.set_content_type("text/html");
        response.enable_compression(16);
        response.set_output(HtmlOutput("<p>nano</p>".repeat(50)));
        assert!(response.send_headers());

        let http = response.finish().unwrap();
        assert!(http.headers().get("content-encoding").is_none());
        assert_eq!(http.headers()["content-type"], "text/html");
        let body = body_bytes(http).await;
        assert_eq!(body, Bytes::from("<p>nano</p>".repeat(50)));
    }

    #[test]
    fn test_untyped_literals() {
        let mut response = Response::new();
        response.set_last_modified(1_700_000_000);
        assert_eq!(response.last_modified(), Some(1_700_000_000));

        let seconds: u64 = 3600;
        response.set_cache_duration(seconds);
        assert_eq!(response.header("Cache-Control"), Some("public, max-age=3600"));
        response.set_cache_duration(Duration::from_secs(120));
        assert_eq!(response.header("Cache-Control"), Some("public, max-age=120"));
        response.set_cache_duration(-7i64);
        assert_eq!(response.header("Cache-Control"), Some("public, max-age=0"));
    }

    #[test]
    fn test_error_response() {
        let response = error_response(&PortalError::not_found("nope"), &Environment::Development);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["content-type"], "application/json");
    }
}
