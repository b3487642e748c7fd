//! Request body encoding and response body decoding.
//!
//! Response decoding is keyed on the declared content type: JSON media types
//! (`application/json` and any `+json` suffix) decode as structured data,
//! everything else as text.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::NetworkError;

/// An outgoing request body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Serialized with `serde_json` before sending.
    Json(Value),
    /// Sent verbatim.
    Text(String),
}

impl Body {
    /// Serializes any `Serialize` value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, NetworkError> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| NetworkError::config(format!("Failed to serialize request body: {e}")))
    }

    /// A JSON `null` stands in for "no data supplied".
    pub fn is_absent(&self) -> bool {
        matches!(self, Body::Json(Value::Null))
    }

    pub(crate) fn into_wire(self) -> String {
        match self {
            Body::Json(value) => value.to_string(),
            Body::Text(text) => text,
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl<T: Into<Body>> From<Option<T>> for Body {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Body::Json(Value::Null))
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 204, `Content-Length: 0`, or no bytes at all.
    Empty,
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Deserializes a JSON payload. `Empty` deserializes from `null`, so
    /// `Option<T>` targets accept it.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Payload::Empty => serde_json::from_value(Value::Null),
            Payload::Json(value) => serde_json::from_value(value.clone()),
            Payload::Text(text) => serde_json::from_str(text),
        }
    }
}

/// How a response body should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Text,
}

impl BodyFormat {
    pub fn for_content_type(content_type: Option<&str>) -> Self {
        let Some(content_type) = content_type else {
            return BodyFormat::Text;
        };
        let media_type = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if media_type == "application/json" || media_type.ends_with("+json") {
            BodyFormat::Json
        } else {
            BodyFormat::Text
        }
    }

    pub fn decode(self, body: &str) -> Result<Payload, serde_json::Error> {
        match self {
            BodyFormat::Json => serde_json::from_str(body).map(Payload::Json),
            BodyFormat::Text => Ok(Payload::Text(body.to_string())),
        }
    }
}
