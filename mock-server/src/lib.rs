use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: String,
    pub stack: Option<String>,
}

#[derive(Default)]
pub struct Store {
    next_id: i64,
    projects: BTreeMap<i64, Project>,
}

pub type Db = Arc<RwLock<Store>>;

type ApiError = (StatusCode, Json<Value>);

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project)
                .put(update_project)
                .patch(update_project)
                .delete(delete_project),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "errors": { "detail": "Not Found" } })),
    )
}

/// Accepts both `{"project": {...}}` and a bare project object.
fn unwrap_params(body: Value) -> Result<Map<String, Value>, ApiError> {
    let body = match body {
        Value::Object(mut map) if map.get("project").is_some_and(Value::is_object) => {
            map.remove("project").unwrap_or_default()
        }
        other => other,
    };
    match body {
        Value::Object(map) => Ok(map),
        _ => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "errors": { "detail": "Bad Request" } })),
        )),
    }
}

fn optional_string(params: &Map<String, Value>, field: &str) -> Option<String> {
    params.get(field).and_then(Value::as_str).map(str::to_string)
}

/// Field errors for required string fields that are present but blank, or
/// missing when `require_all` is set.
fn validate(params: &Map<String, Value>, require_all: bool) -> Result<(), ApiError> {
    let mut errors = Map::new();
    for field in ["name", "status"] {
        let blank = match params.get(field) {
            None => require_all,
            Some(value) => value.as_str().map_or(true, |s| s.trim().is_empty()),
        };
        if blank {
            errors.insert(field.to_string(), json!(["can't be blank"]));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "errors": errors })),
        ))
    }
}

async fn list_projects(State(db): State<Db>) -> Json<Value> {
    let store = db.read().await;
    let projects: Vec<&Project> = store.projects.values().collect();
    Json(json!({ "data": projects }))
}

async fn create_project(
    State(db): State<Db>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let params = unwrap_params(body)?;
    validate(&params, true)?;

    let mut store = db.write().await;
    store.next_id += 1;
    let project = Project {
        id: store.next_id,
        name: optional_string(&params, "name").unwrap_or_default(),
        description: optional_string(&params, "description"),
        status: optional_string(&params, "status").unwrap_or_default(),
        stack: optional_string(&params, "stack"),
    };
    store.projects.insert(project.id, project.clone());
    Ok((StatusCode::CREATED, Json(json!({ "data": project }))))
}

async fn get_project(
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let store = db.read().await;
    let project = store.projects.get(&id).ok_or_else(not_found)?;
    Ok(Json(json!({ "data": project })))
}

async fn update_project(
    State(db): State<Db>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let params = unwrap_params(body)?;
    let mut store = db.write().await;
    let project = store.projects.get_mut(&id).ok_or_else(not_found)?;
    validate(&params, false)?;

    if let Some(name) = optional_string(&params, "name") {
        project.name = name;
    }
    if let Some(status) = optional_string(&params, "status") {
        project.status = status;
    }
    if params.contains_key("description") {
        project.description = optional_string(&params, "description");
    }
    if params.contains_key("stack") {
        project.stack = optional_string(&params, "stack");
    }
    Ok(Json(json!({ "data": project })))
}

async fn delete_project(
    State(db): State<Db>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut store = db.write().await;
    store
        .projects
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}
