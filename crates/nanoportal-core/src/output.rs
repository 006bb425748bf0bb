//! Controller results and the wrappers that turn them into bytes.
//!
//! | Type | Content-Type |
//! |------|--------------|
//! | [`JsonOutput`] | `application/json` |
//! | [`HtmlOutput`] | `text/html; charset=utf-8` |
//! | [`TextOutput`] | `text/plain; charset=utf-8` |

use crate::error::Result;
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Something that knows its content type and how to serialize itself.
pub trait Output: Send {
    /// Value for the `Content-Type` header
    fn content_type(&self) -> &str;

    /// Produce the response body
    fn render(&self) -> Result<Bytes>;
}

/// JSON body
#[derive(Debug, Clone)]
pub struct JsonOutput(pub Value);

impl JsonOutput {
    /// Serialize any value into a JSON output
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self(serde_json::to_value(value)?))
    }
}

impl Output for JsonOutput {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn render(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(&self.0)?))
    }
}

/// HTML body
#[derive(Debug, Clone)]
pub struct HtmlOutput(pub String);

impl Output for HtmlOutput {
    fn content_type(&self) -> &str {
        "text/html; charset=utf-8"
    }

    fn render(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.0.clone()))
    }
}

/// Plain text body
#[derive(Debug, Clone)]
pub struct TextOutput(pub String);

impl Output for TextOutput {
    fn content_type(&self) -> &str {
        "text/plain; charset=utf-8"
    }

    fn render(&self) -> Result<Bytes> {
        Ok(Bytes::from(self.0.clone()))
    }
}

/// What a controller action produced.
pub enum Outcome {
    /// Structured data, formatted by the portal (JSON or a template)
    Data(Value),
    /// A self-rendering wrapper
    Output(Box<dyn Output>),
    /// Nothing beyond what was put in the data bag
    None,
}

impl Outcome {
    /// Wrap any serializable value as [`Outcome::Data`]
    pub fn data<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Data(serde_json::to_value(value)?))
    }

    /// Wrap an [`Output`]
    pub fn output<O: Output + 'static>(output: O) -> Self {
        Self::Output(Box::new(output))
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(v) => f.debug_tuple("Data").field(v).finish(),
            Self::Output(o) => f.debug_tuple("Output").field(&o.content_type()).finish(),
            Self::None => f.write_str("None"),
        }
    }
}

/// Per-invocation key/value store a controller fills for its template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataBag {
    values: Map<String, Value>,
}

impl DataBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous one.
    ///
    /// Values that cannot be represented as JSON are stored as `null`.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.values.insert(key.into(), value);
    }

    /// Get a stored value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a stored string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Check whether a key is set
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove a value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Take the underlying map
    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    /// Convert into a JSON object
    pub fn into_value(self) -> Value {
        Value::Object(self.values)
    }
}

/// Templating contract. `template` is `<controller>/<method>`.
pub trait Renderer: Send + Sync {
    /// Render a template against the data bag
    fn render(&self, template: &str, data: &DataBag) -> Result<String>;

    /// Whether a template with this name exists
    fn has_template(&self, template: &str) -> bool;
}
