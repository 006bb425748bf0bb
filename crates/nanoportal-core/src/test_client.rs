//! TestClient for driving a [`Portal`] without network binding
//!
//! Requests go through the same path as the HTTP server: the head and body
//! are turned into a [`Request`], handed to [`Portal::handle`], and the
//! emitted response is buffered for assertions.
//!
//! # Example
//!
//! ```rust
//! use nanoportal_core::{Controller, Outcome, Portal, TestClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let portal = Portal::default().controller(
//!         Controller::new("home").action("index", |scope, _| {
//!             scope.set("hello", "world");
//!             Ok(Outcome::None)
//!         }),
//!     );
//!     let client = TestClient::new(portal);
//!
//!     let response = client.get("/").await;
//!     response.assert_status(200);
//!     assert_eq!(response.text(), r#"{"hello":"world"}"#);
//! }
//! ```

use crate::app::Portal;
use crate::request::{Request, RequestType};
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// In-process client for a [`Portal`]
pub struct TestClient {
    portal: Arc<Portal>,
    remote_addr: SocketAddr,
}

impl TestClient {
    /// Wrap a portal. Requests appear to come from 127.0.0.1.
    pub fn new(portal: Portal) -> Self {
        Self {
            portal: Arc::new(portal),
            remote_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000),
        }
    }

    /// Use a different peer address for `REMOTE_ADDR`
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = addr;
        self
    }

    /// The wrapped portal
    pub fn portal(&self) -> &Portal {
        &self.portal
    }

    /// Send a GET request
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(TestRequest::get(path)).await
    }

    /// Send a POST with a urlencoded form body
    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        self.request(TestRequest::post(path).form(fields)).await
    }

    /// Send a request with full control
    pub async fn request(&self, req: TestRequest) -> TestResponse {
        let mut head = http::Request::new(());
        *head.method_mut() = req.method;
        *head.uri_mut() = req.path.parse::<Uri>().unwrap_or_default();
        *head.headers_mut() = req.headers;
        let (parts, ()) = head.into_parts();

        let body = req.body.unwrap_or_default();
        let mut request = Request::from_http(&parts, &body, Some(self.remote_addr));
        if let Some(kind) = req.kind {
            request = request.with_kind(kind);
        }

        let response = self.portal.handle(request);
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .unwrap_or_default();

        TestResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }
}

/// Test request builder
#[derive(Debug, Clone)]
pub struct TestRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    kind: Option<RequestType>,
}

impl TestRequest {
    /// Create a request with the given method and path (query string allowed)
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: None,
            kind: None,
        }
    }

    /// Create a GET request
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a POST request
    pub fn post(path: &str) -> Self {
        Self::new(Method::POST, path)
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn header(mut self, key: &str, value: &str) -> Self {
        if let (Ok(name), Ok(val)) = (
            key.parse::<header::HeaderName>(),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, val);
        }
        self
    }

    /// Set a urlencoded form body and its Content-Type
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        if let Ok(encoded) = serde_urlencoded::to_string(fields) {
            self.body = Some(Bytes::from(encoded));
            self.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            );
        }
        self
    }

    /// Set the request body as raw bytes
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Treat the request as an API call
    pub fn api(mut self) -> Self {
        self.kind = Some(RequestType::Api);
        self
    }
}

/// Buffered response with assertion helpers
#[derive(Debug)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Get the response status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header as a string
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }

    /// Get the response body as bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Get the response body as a string (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Parse the response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Assert that the response has the expected status code
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(), expected,
            "Expected status {}, got {}. Body: {}",
            expected, self.status, self.text()
        );
        self
    }

    /// Assert that the response has the expected header value
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, key: &str, expected: &str) -> &Self {
        let actual = self.header(key).unwrap_or("");
        assert_eq!(
            actual, expected,
            "Expected header '{}' to be '{}', got '{}'",
            key, expected, actual
        );
        self
    }

    /// Assert that the response body contains the expected string
    ///
    /// # Panics
    ///
    /// Panics if the body doesn't contain the expected string.
    pub fn assert_body_contains(&self, expected: &str) -> &Self {
        let body = self.text();
        assert!(
            body.contains(expected),
            "Expected body to contain '{}', got '{}'",
            expected,
            body
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use crate::output::Outcome;
    use serde_json::{json, Value};

    fn client() -> TestClient {
        TestClient::new(
            Portal::default().controller(
                Controller::new("echo")
                    .action("index", |scope, _| {
                        let params = scope.request().params().clone();
                        let posted = scope.request().was_posted();
                        let ip = scope.request().ip().map(|ip| ip.to_string());
                        scope.set("params", params);
                        scope.set("posted", posted);
                        scope.set("ip", ip);
                        Ok(Outcome::None)
                    })
                    .action("kind", |scope, _| {
                        Outcome::data(&scope.request().kind().as_str())
                    }),
            ),
        )
    }

    #[tokio::test]
    async fn test_get_with_query() {
        let response = client().get("/echo?name=ada").await;
        response.assert_status(200);
        let body: Value = response.json().unwrap();
        assert_eq!(body["params"], json!({"name": "ada"}));
        assert_eq!(body["posted"], json!(false));
        assert_eq!(body["ip"], json!("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_post_form() {
        let response = client().post_form("/echo", &[("title", "a b&c")]).await;
        let body: Value = response.json().unwrap();
        assert_eq!(body["params"], json!({"title": "a b&c"}));
        assert_eq!(body["posted"], json!(true));
    }

    #[tokio::test]
    async fn test_forwarded_for_from_header() {
        let client = client().with_remote_addr("10.0.0.5:9000".parse().unwrap());
        let response = client
            .request(TestRequest::get("/echo").header("X-Forwarded-For", "192.168.1.2, 8.8.8.8"))
            .await;
        let body: Value = response.json().unwrap();
        assert_eq!(body["ip"], json!("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_api_kind() {
        let response = client().request(TestRequest::get("/echo/kind").api()).await;
        assert_eq!(response.json::<String>().unwrap(), "api");
    }

    #[tokio::test]
    async fn test_not_found() {
        client()
            .get("/nowhere")
            .await
            .assert_status(404)
            .assert_header("content-type", "application/json")
            .assert_body_contains("not_found");
    }
}
