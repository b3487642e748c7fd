//! Async HTTP client core for the project tracker.
//!
//! # Overview
//! `Network` mediates every request to the REST backend: it resolves URLs
//! against a base, merges default and per-call headers, races each call
//! against a deadline and an optional caller cancellation token, and turns
//! the outcome into either a decoded `NetworkResponse` or a `NetworkError`.
//!
//! # Design
//! - The client is a configuration holder plus a stateless executor; requests
//!   share nothing mutable and may run concurrently on one instance.
//! - The wire sits behind the `Transport` trait. `ReqwestTransport` is the
//!   production implementation; tests substitute in-memory transports.
//! - `ProjectService` is the one consumer in this crate: single create,
//!   listing, and concurrent bulk import with per-item failure reporting.

pub mod client;
pub mod codec;
pub mod error;
pub mod http;
pub mod projects;
pub mod settings;
pub mod signal;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use client::{ClientConfig, Network, NetworkResponse, RequestOptions, DEFAULT_TIMEOUT};
pub use codec::{Body, BodyFormat, Payload};
pub use error::{ErrorKind, NetworkError};
pub use http::{Headers, HttpMethod, HttpRequest, HttpResponse};
pub use projects::{
    parse_import, ImportError, ImportFailure, ImportReport, Project, ProjectInput, ProjectService,
};
pub use settings::{Mode, Settings, SettingsError};
pub use signal::{CancelCause, RequestSignal};
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use tokio_util::sync::CancellationToken;
