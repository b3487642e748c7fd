//! The `projects` resource: list, create, and bulk import.
//!
//! # Design
//! `ProjectService` is a thin consumer of `Network`. Bulk import fans out one
//! create per item and waits for all of them; a failed item is recorded in
//! the report and never cancels its siblings. Results are keyed by the
//! item's position in the input, not by completion order.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::client::{Network, NetworkResponse};
use crate::codec::Body;
use crate::error::NetworkError;
use crate::transport::{ReqwestTransport, Transport};

pub const PROJECTS_PATH: &str = "projects";

/// A project as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inserted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Payload for creating a project.
///
/// Required fields default to empty so that incomplete imports still reach
/// the backend, which owns validation. Fields this type does not model
/// (`priority`, `phase`, ...) are kept in `extra` and sent unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectInput {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectInput {
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            ..Self::default()
        }
    }
}

/// The backend answers either `{"data": ...}` or the bare value.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(value) => value,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid JSON: expected a project object or an array of project objects")]
    UnexpectedShape,
    #[error("Nothing to import")]
    Empty,
}

/// Parses import text holding one project object or an array of them.
///
/// Items are kept as raw JSON: the backend validates their fields, and an
/// array element that is not an object fails on its own during the import.
pub fn parse_import(text: &str) -> Result<Vec<Value>, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let items = match value {
        Value::Object(_) => vec![value],
        Value::Array(items) => items,
        _ => return Err(ImportError::UnexpectedShape),
    };
    if items.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(items)
}

/// One item that failed during a bulk import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    /// Position in the submitted list.
    pub index: usize,
    pub status: u16,
    pub message: String,
}

/// Aggregate outcome of a bulk import.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub success_count: usize,
    pub failure_count: usize,
    /// Projects echoed back by the backend. A 2xx reply without a decodable
    /// project still counts as a success but adds nothing here.
    pub created: Vec<Project>,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn is_complete_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Client for the `projects` resource.
#[derive(Debug, Clone)]
pub struct ProjectService<T = ReqwestTransport> {
    network: Network<T>,
}

impl<T: Transport> ProjectService<T> {
    pub fn new(network: Network<T>) -> Self {
        Self { network }
    }

    pub fn network(&self) -> &Network<T> {
        &self.network
    }

    pub async fn list(&self) -> Result<Vec<Project>, NetworkError> {
        let response = self.network.get(PROJECTS_PATH, None).await?;
        if response.data.is_empty() {
            return Ok(Vec::new());
        }
        Ok(response.json::<Envelope<Vec<Project>>>()?.into_inner())
    }

    pub async fn create(&self, input: &ProjectInput) -> Result<Project, NetworkError> {
        let response = self.submit(input).await?;
        Ok(response.json::<Envelope<Project>>()?.into_inner())
    }

    /// Creates one project and reports only the HTTP status: the response
    /// status on success, the error's status otherwise (0 without a response).
    pub async fn add(&self, input: &ProjectInput) -> u16 {
        match self.submit(input).await {
            Ok(response) => response.status,
            Err(e) => {
                debug!(status = e.status, error = %e, "project create failed");
                e.status
            }
        }
    }

    /// Creates every item concurrently and aggregates the outcomes.
    ///
    /// An item succeeds when the backend accepts it, whatever the reply body
    /// looks like. Items that do not serialize to a JSON object fail locally
    /// without a request.
    pub async fn bulk_import<I: Serialize>(&self, items: &[I]) -> ImportReport {
        let outcomes = join_all(items.iter().map(|item| self.submit(item))).await;

        let mut report = ImportReport::default();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(response) => {
                    report.success_count += 1;
                    match response.json::<Envelope<Project>>() {
                        Ok(project) => report.created.push(project.into_inner()),
                        Err(e) => debug!(index, error = %e, "created project not echoed back"),
                    }
                }
                Err(e) => {
                    report.failure_count += 1;
                    report.failures.push(ImportFailure {
                        index,
                        status: e.status,
                        message: e.describe(),
                    });
                }
            }
        }
        info!(
            succeeded = report.success_count,
            failed = report.failure_count,
            "bulk import finished"
        );
        report
    }

    async fn submit<I: Serialize + ?Sized>(&self, item: &I) -> Result<NetworkResponse, NetworkError> {
        let body = Body::json(item)?;
        if !matches!(body, Body::Json(Value::Object(_))) {
            return Err(NetworkError::config("Invalid project: expected a JSON object"));
        }
        self.network.post(PROJECTS_PATH, body, None).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::sync::Barrier;

    use super::*;
    use crate::client::ClientConfig;
    use crate::http::{HttpRequest, HttpResponse};
    use crate::test_support::{response, Reply, ScriptedTransport};
    use crate::transport::TransportError;

    fn service(
        script: impl Fn(&HttpRequest) -> Reply + Send + Sync + 'static,
    ) -> ProjectService<ScriptedTransport> {
        let network = Network::with_transport(
            ClientConfig::new("http://localhost:4000/api/"),
            ScriptedTransport::new(script),
        );
        ProjectService::new(network)
    }

    /// Mirrors the backend: blank names are rejected with field errors.
    fn create_or_reject(request: &HttpRequest) -> Reply {
        let body: Value = serde_json::from_str(request.body.as_deref().unwrap_or("null")).unwrap();
        let name = body["name"].as_str().unwrap_or_default();
        if name.is_empty() {
            return Reply::Respond(response(
                422,
                Some("application/json"),
                r#"{"errors":{"name":["required"]}}"#,
            ));
        }
        let created = json!({"data": {"id": name.len(), "name": name, "status": body["status"]}});
        Reply::Respond(response(201, Some("application/json"), &created.to_string()))
    }

    #[test]
    fn parse_import_single_object() {
        let items = parse_import(r#"{"name":"Atlas","status":"Planned","priority":"medium"}"#).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "Atlas");
        assert_eq!(items[0]["priority"], json!("medium"));
    }

    #[test]
    fn parse_import_keeps_items_raw() {
        let items = parse_import(r#"[{"name":"A","status":"x"},{"name":null,"description":5},7]"#).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], json!({"name": null, "description": 5}));
        assert_eq!(items[2], json!(7));
    }

    #[test]
    fn parse_import_rejects_bad_input() {
        let err = parse_import("{oops").unwrap_err();
        assert!(err.to_string().starts_with("Invalid JSON: "));
        assert!(matches!(parse_import("42"), Err(ImportError::UnexpectedShape)));
        assert!(matches!(parse_import("[]"), Err(ImportError::Empty)));
    }

    #[test]
    fn input_serializes_extra_fields_flat() {
        let mut input = ProjectInput::new("Atlas", "Planned");
        input.extra.insert("is_active".to_string(), json!(true));
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value, json!({"name": "Atlas", "status": "Planned", "is_active": true}));
    }

    #[tokio::test]
    async fn list_accepts_wrapped_and_bare() {
        let wrapped = service(|_| {
            Reply::Respond(response(
                200,
                Some("application/json"),
                r#"{"data":[{"id":1,"name":"A","status":"Planned"}]}"#,
            ))
        });
        let projects = wrapped.list().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, 1);

        let bare = service(|_| {
            Reply::Respond(response(200, Some("application/json"), r#"[{"id":2,"name":"B","status":"Done"}]"#))
        });
        assert_eq!(bare.list().await.unwrap()[0].name, "B");

        let sent = wrapped.network().transport().requests();
        assert_eq!(sent[0].url, "http://localhost:4000/api/projects");
    }

    #[tokio::test]
    async fn add_reports_status_codes() {
        let svc = service(create_or_reject);
        assert_eq!(svc.add(&ProjectInput::new("Atlas", "Planned")).await, 201);
        assert_eq!(svc.add(&ProjectInput::new("", "Planned")).await, 422);

        let offline = service(|_| Reply::Fail("connection refused"));
        assert_eq!(offline.add(&ProjectInput::new("Atlas", "Planned")).await, 0);
    }

    #[tokio::test]
    async fn create_returns_the_stored_project() {
        let svc = service(create_or_reject);
        let project = svc.create(&ProjectInput::new("Atlas", "Planned")).await.unwrap();
        assert_eq!(project.name, "Atlas");
        assert_eq!(project.status, "Planned");
    }

    /// Every request parks on a barrier sized to the batch, so the import
    /// only finishes if all creates are in flight at the same time.
    struct BarrierTransport {
        barrier: Barrier,
        seen: AtomicUsize,
    }

    impl Transport for BarrierTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            self.barrier.wait().await;
            match create_or_reject(&request) {
                Reply::Respond(response) => Ok(response),
                _ => unreachable!(),
            }
        }
    }

    #[tokio::test]
    async fn bulk_import_runs_concurrently_and_isolates_failures() {
        let network = Network::with_transport(
            ClientConfig::new("http://localhost:4000/api"),
            BarrierTransport {
                barrier: Barrier::new(5),
                seen: AtomicUsize::new(0),
            },
        );
        let svc = ProjectService::new(network);
        let inputs = vec![
            ProjectInput::new("Atlas", "Planned"),
            ProjectInput::new("", "Planned"),
            ProjectInput::new("Borealis", "Active"),
            ProjectInput::new("", "Done"),
            ProjectInput::new("Cirrus", "Planned"),
        ];

        let report = svc.bulk_import(&inputs).await;

        assert_eq!(svc.network().transport().seen.load(Ordering::SeqCst), 5);
        assert_eq!(report.success_count, 3);
        assert_eq!(report.failure_count, 2);
        assert_eq!(report.total(), 5);
        assert!(!report.is_complete_success());
        let failed: Vec<usize> = report.failures.iter().map(|f| f.index).collect();
        assert_eq!(failed, vec![1, 3]);
        for failure in &report.failures {
            assert_eq!(failure.status, 422);
            assert!(failure.message.contains("name: required"));
        }
        let names: Vec<&str> = report.created.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Atlas", "Borealis", "Cirrus"]);
    }

    #[tokio::test]
    async fn bulk_import_reports_transport_failures_per_item() {
        let svc = service(|request| {
            if request.body.as_deref().is_some_and(|b| b.contains("Down")) {
                Reply::Fail("connection reset")
            } else {
                create_or_reject(request)
            }
        });
        let inputs = vec![ProjectInput::new("Up", "Planned"), ProjectInput::new("Down", "Planned")];
        let report = svc.bulk_import(&inputs).await;
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].status, 0);
        assert_eq!(report.failures[0].message, "Network request failed: connection reset");
    }

    #[tokio::test]
    async fn bulk_import_counts_accepted_items_without_a_body() {
        let svc = service(|_| Reply::Respond(response(201, None, "")));
        let inputs = vec![ProjectInput::new("Atlas", "Planned"), ProjectInput::new("Borealis", "Active")];

        let report = svc.bulk_import(&inputs).await;

        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 0);
        assert!(report.is_complete_success());
        assert!(report.created.is_empty());
        assert_eq!(svc.network().transport().requests().len(), 2);
    }

    #[tokio::test]
    async fn bulk_import_accepts_reply_without_project_shape() {
        let svc = service(|_| Reply::Respond(response(201, Some("text/plain"), "created")));
        let report = svc.bulk_import(&[ProjectInput::new("Atlas", "Planned")]).await;
        assert_eq!(report.success_count, 1);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn bulk_import_isolates_badly_typed_items() {
        let svc = service(create_or_reject);
        let items = parse_import(
            r#"[
                {"name":"Atlas","status":"Planned"},
                {"name":null,"status":"Planned"},
                {"name":"Cirrus","status":"Done","description":5},
                7
            ]"#,
        )
        .unwrap();

        let report = svc.bulk_import(&items).await;

        assert_eq!(report.success_count, 2);
        assert_eq!(report.failure_count, 2);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].status, 422);
        assert_eq!(report.failures[0].message, "name: required");
        assert_eq!(report.failures[1].index, 3);
        assert_eq!(report.failures[1].status, 0);
        assert!(report.failures[1].message.contains("expected a JSON object"));
        // The non-object item never reaches the wire.
        assert_eq!(svc.network().transport().requests().len(), 3);
    }
}
