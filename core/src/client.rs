//! The request client.
//!
//! # Design
//! `Network` is a configuration holder plus a stateless executor. Every verb
//! method funnels into `execute`, which resolves the URL, merges headers,
//! races the transport against a `RequestSignal`, and classifies the outcome
//! into a `NetworkResponse` or a `NetworkError`.
//!
//! Configuration lives behind an `Arc` and is copied on write. The mutating
//! setters take `&mut self`, so the borrow checker already rules out changing
//! a client while one of its own requests is running; a clone that has a
//! request in flight keeps the snapshot it started with.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::{Body, BodyFormat, Payload};
use crate::error::NetworkError;
use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse};
use crate::signal::{CancelCause, RequestSignal};
use crate::transport::{ReqwestTransport, Transport};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Decides which status codes count as success.
pub type StatusPredicate = Arc<dyn Fn(u16) -> bool + Send + Sync>;

fn default_headers() -> Headers {
    [
        ("Content-Type", "application/json"),
        ("Accept", "application/json"),
    ]
    .into_iter()
    .collect()
}

fn is_absolute(endpoint: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        endpoint
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

fn require_key(key: &str) -> Result<(), NetworkError> {
    if key.trim().is_empty() {
        return Err(NetworkError::config("Header key must be a non-empty string"));
    }
    Ok(())
}

/// Per-instance configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// May be empty, in which case every endpoint must be absolute.
    pub base_url: String,
    pub timeout: Duration,
    pub headers: Headers,
    pub validate_status: StatusPredicate,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: DEFAULT_TIMEOUT,
            headers: default_headers(),
            validate_status: Arc::new(|status| (200..300).contains(&status)),
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// A zero timeout leaves the default in place.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    /// Adds or replaces a default header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_validate_status<F>(mut self, predicate: F) -> Self
    where
        F: Fn(u16) -> bool + Send + Sync + 'static,
    {
        self.validate_status = Arc::new(predicate);
        self
    }

    /// Joins `endpoint` onto the base URL, or passes an absolute URL through.
    pub fn resolve(&self, endpoint: &str) -> Result<String, NetworkError> {
        if is_absolute(endpoint) {
            return Ok(endpoint.to_string());
        }
        if self.base_url.is_empty() {
            return Err(NetworkError::config(
                "URL is required. Set a base URL or provide an absolute endpoint.",
            ));
        }
        let base = self.base_url.strip_suffix('/').unwrap_or(&self.base_url);
        let path = endpoint.strip_prefix('/').unwrap_or(endpoint);
        Ok(format!("{base}/{path}"))
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Headers,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct NetworkResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Headers,
    pub data: Payload,
}

impl NetworkResponse {
    /// Deserializes the payload into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, NetworkError> {
        self.data
            .deserialize()
            .map_err(|e| NetworkError::decode(self.status, self.status_text.clone(), e))
    }
}

/// HTTP client bound to one configuration.
pub struct Network<T = ReqwestTransport> {
    config: Arc<ClientConfig>,
    transport: Arc<T>,
}

impl<T> Clone for Network<T> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T> fmt::Debug for Network<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Network<ReqwestTransport> {
    /// Client with default configuration bound to `base_url`.
    pub fn new(base_url: &str) -> Result<Self, NetworkError> {
        if base_url.is_empty() {
            return Err(NetworkError::config("Base URL must be a non-empty string"));
        }
        Ok(Self::with_transport(ClientConfig::new(base_url), ReqwestTransport::new()))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_transport(config, ReqwestTransport::new())
    }
}

impl<T: Transport> Network<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn resolve(&self, endpoint: &str) -> Result<String, NetworkError> {
        self.config.resolve(endpoint)
    }

    pub fn set_base_url(&mut self, url: &str) -> Result<(), NetworkError> {
        if url.is_empty() {
            return Err(NetworkError::config("Base URL must be a non-empty string"));
        }
        Arc::make_mut(&mut self.config).base_url = url.to_string();
        Ok(())
    }

    /// Sets a default header for every later request from this instance.
    pub fn set_header(&mut self, key: &str, value: &str) -> Result<(), NetworkError> {
        require_key(key)?;
        Arc::make_mut(&mut self.config).headers.insert(key, value);
        Ok(())
    }

    pub fn remove_header(&mut self, key: &str) -> Result<(), NetworkError> {
        require_key(key)?;
        Arc::make_mut(&mut self.config).headers.remove(key);
        Ok(())
    }

    /// Returns a new client with `key` set; `self` is left untouched.
    pub fn with_header(&self, key: &str, value: &str) -> Result<Self, NetworkError> {
        let mut derived = self.clone();
        derived.set_header(key, value)?;
        Ok(derived)
    }

    pub async fn get(
        &self,
        endpoint: &str,
        options: Option<RequestOptions>,
    ) -> Result<NetworkResponse, NetworkError> {
        self.execute(endpoint, HttpMethod::Get, None, options).await
    }

    /// POST always carries a body; an absent one fails before any I/O.
    pub async fn post(
        &self,
        endpoint: &str,
        data: impl Into<Body>,
        options: Option<RequestOptions>,
    ) -> Result<NetworkResponse, NetworkError> {
        let data = data.into();
        if data.is_absent() {
            return Err(NetworkError::config("POST request requires data"));
        }
        self.execute(endpoint, HttpMethod::Post, Some(data), options).await
    }

    /// PUT always carries a body; an absent one fails before any I/O.
    pub async fn put(
        &self,
        endpoint: &str,
        data: impl Into<Body>,
        options: Option<RequestOptions>,
    ) -> Result<NetworkResponse, NetworkError> {
        let data = data.into();
        if data.is_absent() {
            return Err(NetworkError::config("PUT request requires data"));
        }
        self.execute(endpoint, HttpMethod::Put, Some(data), options).await
    }

    pub async fn patch(
        &self,
        endpoint: &str,
        data: Option<Body>,
        options: Option<RequestOptions>,
    ) -> Result<NetworkResponse, NetworkError> {
        self.execute(endpoint, HttpMethod::Patch, data, options).await
    }

    pub async fn delete(
        &self,
        endpoint: &str,
        options: Option<RequestOptions>,
    ) -> Result<NetworkResponse, NetworkError> {
        self.execute(endpoint, HttpMethod::Delete, None, options).await
    }

    pub async fn head(
        &self,
        endpoint: &str,
        options: Option<RequestOptions>,
    ) -> Result<NetworkResponse, NetworkError> {
        self.execute(endpoint, HttpMethod::Head, None, options).await
    }

    pub async fn options(
        &self,
        endpoint: &str,
        options: Option<RequestOptions>,
    ) -> Result<NetworkResponse, NetworkError> {
        self.execute(endpoint, HttpMethod::Options, None, options).await
    }

    /// Single choke point for every verb.
    pub async fn execute(
        &self,
        endpoint: &str,
        method: HttpMethod,
        body: Option<Body>,
        options: Option<RequestOptions>,
    ) -> Result<NetworkResponse, NetworkError> {
        let config = Arc::clone(&self.config);
        let options = options.unwrap_or_default();

        let url = config.resolve(endpoint)?;
        let headers = config.headers.merged(&options.headers);
        let timeout = options
            .timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(config.timeout);
        let body = body
            .filter(|_| method.carries_body())
            .map(Body::into_wire);

        let request = HttpRequest {
            method,
            url: url.clone(),
            headers,
            body,
        };

        let mut signal = RequestSignal::derive(timeout, options.cancel.as_ref());
        debug!(%method, %url, timeout_ms = timeout.as_millis() as u64, "sending request");

        let outcome = tokio::select! {
            biased;
            cause = signal.fired() => Err(cause),
            result = self.transport.send(request) => Ok(result),
        };
        drop(signal);

        let response = match outcome {
            Err(cause) => {
                match cause {
                    CancelCause::Timeout => warn!(%method, %url, "request timed out"),
                    CancelCause::Caller => debug!(%method, %url, "request cancelled by caller"),
                }
                return Err(NetworkError::timeout());
            }
            Ok(Err(e)) => {
                warn!(%method, %url, error = %e, "transport failure");
                return Err(NetworkError::transport(e));
            }
            Ok(Ok(response)) => response,
        };

        debug!(%method, %url, status = response.status, "received response");
        classify(&config, response)
    }
}

fn classify(config: &ClientConfig, response: HttpResponse) -> Result<NetworkResponse, NetworkError> {
    if !(config.validate_status)(response.status) {
        let body = serde_json::from_str::<Value>(&response.body)
            .unwrap_or_else(|_| json!({ "message": response.body }));
        return Err(NetworkError::status(response.status, response.status_text, body));
    }

    let data = if response.is_empty() {
        Payload::Empty
    } else {
        BodyFormat::for_content_type(response.content_type())
            .decode(&response.body)
            .map_err(|e| NetworkError::decode(response.status, response.status_text.clone(), e))?
    };

    Ok(NetworkResponse {
        status: response.status,
        status_text: response.status_text,
        headers: response.headers,
        data,
    })
}
