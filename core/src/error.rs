//! Error type surfaced by the request client.
//!
//! # Design
//! Every failure path in `Network` ends in a single `NetworkError` shape so
//! callers can inspect `status` and `response_body` without matching on
//! transport-specific types. `kind` keeps the taxonomy explicit:
//!
//! - `Config`: rejected before any network activity (programmer error).
//! - `Transport`: no response was obtained; `status` is 0.
//! - `Timeout`: the deadline or the caller's token fired; `status` is 408.
//! - `Status`: the server answered outside the success predicate.
//! - `Decode`: the server answered with success but the body did not match
//!   its declared content type.

use std::collections::BTreeMap;

use serde_json::Value;

/// Coarse classification of a `NetworkError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Transport,
    Timeout,
    Status,
    Decode,
}

/// The only error returned by `Network` request methods.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct NetworkError {
    pub kind: ErrorKind,
    /// HTTP status, or 0 when no response was received.
    pub status: u16,
    pub status_text: String,
    pub message: String,
    pub response_body: Option<Value>,
}

impl NetworkError {
    pub fn config(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Config,
            status: 0,
            status_text: "Configuration Error".to_string(),
            message: message.into(),
            response_body: None,
        }
    }

    pub fn transport(detail: impl std::fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Transport,
            status: 0,
            status_text: "Network Error".to_string(),
            message: format!("Network request failed: {detail}"),
            response_body: None,
        }
    }

    pub fn timeout() -> Self {
        Self {
            kind: ErrorKind::Timeout,
            status: 408,
            status_text: "Request Timeout".to_string(),
            message: "Request timeout".to_string(),
            response_body: None,
        }
    }

    pub fn status(status: u16, status_text: impl Into<String>, body: Value) -> Self {
        Self {
            kind: ErrorKind::Status,
            status,
            status_text: status_text.into(),
            message: format!("Request failed with status {status}"),
            response_body: Some(body),
        }
    }

    pub fn decode(status: u16, status_text: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Decode,
            status,
            status_text: status_text.into(),
            message: format!("Failed to decode response body: {detail}"),
            response_body: None,
        }
    }

    /// Transport failures and timeouts may succeed if the caller tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport | ErrorKind::Timeout)
    }

    /// Field-level validation messages from `response_body.errors`.
    ///
    /// Each field may map to a single string or an array of strings; other
    /// shapes are skipped.
    pub fn field_errors(&self) -> BTreeMap<String, Vec<String>> {
        let mut out = BTreeMap::new();
        let Some(errors) = self
            .response_body
            .as_ref()
            .and_then(|body| body.get("errors"))
            .and_then(Value::as_object)
        else {
            return out;
        };

        for (field, messages) in errors {
            let messages: Vec<String> = match messages {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect(),
                _ => continue,
            };
            if !messages.is_empty() {
                out.insert(field.clone(), messages);
            }
        }
        out
    }

    /// Human-readable summary: `"name: required; status: can't be blank"`,
    /// or `message` when the body carries no field errors.
    pub fn describe(&self) -> String {
        let fields = self.field_errors();
        if fields.is_empty() {
            return self.message.clone();
        }
        fields
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
