//! Request types for nanoPortal
//!
//! A [`Request`] is built once per inbound call (or synthetically for
//! internal and API dispatch) and is read-only afterwards, except for the
//! path, which may be rewritten before routing to strip a format extension.
//!
//! Lookups never fail: absent or malformed input degrades to defaults.

use http::{request::Parts, Method};
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use uuid::Uuid;

/// Environment key holding the client-supplied IP header
const ENV_CLIENT_IP: &str = "HTTP_CLIENT_IP";
/// Environment key holding the transport peer address
const ENV_REMOTE_ADDR: &str = "REMOTE_ADDR";
/// Environment key holding the proxy forwarding chain
const ENV_FORWARDED_FOR: &str = "HTTP_X_FORWARDED_FOR";

/// How a request entered the application.
///
/// Drives output format defaults (API requests always get JSON) and the
/// bucket a request is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    /// Browser/HTTP GET (and anything that is not a POST)
    Get,
    /// Form submission
    Post,
    /// JSON API call
    Api,
    /// Dispatched from application code
    Internal,
    /// Command-line invocation
    Cli,
}

impl RequestType {
    /// Lowercase name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Api => "api",
            Self::Internal => "internal",
            Self::Cli => "cli",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier correlating every log line of a single request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incoming call: parameters, CGI-style environment, type and path.
#[derive(Clone)]
pub struct Request {
    kind: RequestType,
    method: Method,
    path: String,
    params: HashMap<String, String>,
    env: HashMap<String, String>,
    id: RequestId,
}

impl Request {
    /// Create a request from its raw parts.
    ///
    /// The verb is taken from `REQUEST_METHOD` in `env`; when absent it is
    /// POST for [`RequestType::Post`] and GET otherwise.
    pub fn new(
        kind: RequestType,
        path: &str,
        params: HashMap<String, String>,
        env: HashMap<String, String>,
    ) -> Self {
        let method = env
            .get("REQUEST_METHOD")
            .and_then(|m| Method::from_bytes(m.as_bytes()).ok())
            .unwrap_or(match kind {
                RequestType::Post => Method::POST,
                _ => Method::GET,
            });

        Self {
            kind,
            method,
            path: normalize_path(path),
            params,
            env,
            id: RequestId::generate(),
        }
    }

    /// Create a parameterless request for `path`
    pub fn for_path(kind: RequestType, path: &str) -> Self {
        Self::new(kind, path, HashMap::new(), HashMap::new())
    }

    /// Create an internal (application-dispatched) request
    pub fn internal(path: &str, params: HashMap<String, String>) -> Self {
        Self::new(RequestType::Internal, path, params, HashMap::new())
    }

    /// Create an API request
    pub fn api(path: &str, params: HashMap<String, String>) -> Self {
        Self::new(RequestType::Api, path, params, HashMap::new())
    }

    /// Create a command-line request
    pub fn cli(path: &str, params: HashMap<String, String>) -> Self {
        Self::new(RequestType::Cli, path, params, HashMap::new())
    }

    /// Build a request from an HTTP request head and its buffered body.
    ///
    /// Headers land in the environment as `HTTP_<NAME>` with dashes turned
    /// into underscores. Parameters come from the query string, then from a
    /// urlencoded form body (body values win).
    pub fn from_http(parts: &Parts, body: &[u8], remote_addr: Option<SocketAddr>) -> Self {
        let mut env = HashMap::new();
        env.insert("REQUEST_METHOD".to_string(), parts.method.to_string());
        env.insert("REQUEST_URI".to_string(), parts.uri.to_string());
        env.insert(
            "SERVER_PROTOCOL".to_string(),
            format!("{:?}", parts.version),
        );
        if let Some(query) = parts.uri.query() {
            env.insert("QUERY_STRING".to_string(), query.to_string());
        }
        if let Some(addr) = remote_addr {
            env.insert(ENV_REMOTE_ADDR.to_string(), addr.ip().to_string());
        }
        for (name, value) in &parts.headers {
            if let Ok(value) = value.to_str() {
                env.insert(header_env_key(name.as_str()), value.to_string());
            }
        }

        let mut params: HashMap<String, String> = HashMap::new();
        if let Some(query) = parts.uri.query() {
            params.extend(parse_urlencoded(query.as_bytes()));
        }
        let is_form = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        if is_form {
            params.extend(parse_urlencoded(body));
        }

        let kind = if parts.method == Method::POST {
            RequestType::Post
        } else {
            RequestType::Get
        };

        Self::new(kind, parts.uri.path(), params, env)
    }

    /// Override how the request entered the application (builder style)
    pub fn with_kind(mut self, kind: RequestType) -> Self {
        self.kind = kind;
        self
    }

    /// Add a parameter (builder style)
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Add a raw environment entry (builder style)
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add a header, stored under its `HTTP_*` environment key (builder style)
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.env.insert(header_env_key(name), value.into());
        self
    }

    /// Get the request type
    pub fn kind(&self) -> RequestType {
        self.kind
    }

    /// Get the HTTP verb
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the per-request correlation id
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Get a parameter, or `default` when absent
    pub fn get<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.params.get(name).map(String::as_str).unwrap_or(default)
    }

    /// Get a parameter if present
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// All parameters
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Get a parameter as an integer.
    ///
    /// Absent keys yield `default`. Present values are coerced by their
    /// leading integer: `"42abc"` is 42, `"abc"` is 0. Never fails.
    pub fn get_int(&self, name: &str, default: i64) -> i64 {
        match self.params.get(name) {
            Some(value) => coerce_int(value),
            None => default,
        }
    }

    /// True iff the parameter is exactly `"on"` (HTML checkbox convention)
    pub fn get_checked(&self, name: &str) -> bool {
        self.params.get(name).map(|v| v == "on").unwrap_or(false)
    }

    /// True iff the verb is POST
    pub fn was_posted(&self) -> bool {
        self.method == Method::POST
    }

    /// Look up a raw environment entry
    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    /// Look up a request header by its HTTP name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.env.get(&header_env_key(name)).map(String::as_str)
    }

    /// Resolve the client address.
    ///
    /// Order: `Client-IP` header, then the transport peer address, then the
    /// first entry of `X-Forwarded-For` (left to right) outside the private
    /// and reserved IPv4 ranges. Entries that do not parse as an address are
    /// skipped. Returns `None` if nothing usable is present.
    pub fn ip(&self) -> Option<IpAddr> {
        if let Some(ip) = self.env_ip(ENV_CLIENT_IP) {
            return Some(ip);
        }
        if let Some(ip) = self.env_ip(ENV_REMOTE_ADDR) {
            return Some(ip);
        }
        self.env
            .get(ENV_FORWARDED_FOR)?
            .split(',')
            .filter_map(|entry| entry.trim().parse::<IpAddr>().ok())
            .find(|ip| !is_private(ip))
    }

    fn env_ip(&self, key: &str) -> Option<IpAddr> {
        self.env
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .and_then(|v| v.parse().ok())
    }

    /// Get the normalized path (no query string, no surrounding slashes)
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Replace the path; it is normalized the same way as at construction
    pub fn set_path(&mut self, path: &str) {
        self.path = normalize_path(path);
    }

    /// The text after the final `.` of the last path segment, if any
    pub fn extension(&self) -> Option<&str> {
        let last = self.path.rsplit('/').next()?;
        let (_, ext) = last.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext)
        }
    }

    /// Strip the extension from the path and return it.
    pub fn strip_extension(&mut self) -> Option<String> {
        let ext = self.extension()?.to_string();
        let new_len = self.path.len() - ext.len() - 1;
        self.path.truncate(new_len);
        self.path = normalize_path(&self.path);
        Some(ext)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("id", &self.id)
            .finish()
    }
}

/// Drop the query string and trim separators from both ends.
pub(crate) fn normalize_path(path: &str) -> String {
    let path = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
    path.trim_matches('/').to_string()
}

fn header_env_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len() + 5);
    key.push_str("HTTP_");
    for c in name.chars() {
        key.push(if c == '-' { '_' } else { c.to_ascii_uppercase() });
    }
    key
}

fn parse_urlencoded(input: &[u8]) -> Vec<(String, String)> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(input).unwrap_or_default()
}

/// Leading-integer coercion: optional whitespace and sign, then digits.
fn coerce_int(value: &str) -> i64 {
    let s = value.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut result: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        let digit = i64::from(b - b'0');
        result = result.saturating_mul(10);
        result = if negative {
            result.saturating_sub(digit)
        } else {
            result.saturating_add(digit)
        };
    }
    result
}

/// 10/8, 172.16/12, 192.168/16, 127/8, 0/8, 224/8 and 240/8
fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || v6.is_multicast(),
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, _, _] = ip.octets();
    matches!(a, 10 | 127 | 0 | 224 | 240)
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
}
