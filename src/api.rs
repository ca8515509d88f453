//! JSON API over the task store.
//!
//! Handlers are thin: each one moves its payload onto the blocking pool, opens
//! a connection there and calls into `ops` or `tree`. Failures come back as
//! `{"error": "..."}` with a status picked from the [`TaskError`] kind.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use log::{error, info, warn};
use rusqlite::Connection;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::db::Db;
use crate::error::TaskError;
use crate::infer::SkillInference;
use crate::model::{DeveloperView, SkillView, TaskView};
use crate::ops::{self, DeveloperUpdate, NewDeveloper, TaskUpdate};
use crate::tree::{self, NewTask, TaskPatch};

pub struct AppState {
    db: Db,
    inference: Arc<dyn SkillInference>,
}

impl AppState {
    pub fn new(db: Db, inference: Arc<dyn SkillInference>) -> Arc<Self> {
        Arc::new(Self { db, inference })
    }

    /// Run `f` on the blocking pool with a fresh connection.
    /// `context` is the client-facing message if `f` fails unexpectedly.
    async fn run<T, F>(self: &Arc<Self>, context: &'static str, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &dyn SkillInference) -> anyhow::Result<T> + Send + 'static,
    {
        let state = Arc::clone(self);
        let joined = tokio::task::spawn_blocking(move || {
            let conn = state.db.connect()?;
            f(&conn, state.inference.as_ref())
        })
        .await;
        match joined {
            Ok(res) => res.map_err(|error| ApiError::Failed { context, error }),
            Err(join) => Err(ApiError::Failed {
                context,
                error: join.into(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{context}: {error:#}")]
    Failed {
        context: &'static str,
        error: anyhow::Error,
    },
    #[error("invalid request body: {0}")]
    BadBody(#[from] JsonRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadBody(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            ApiError::Failed { context, error } => match error.downcast_ref::<TaskError>() {
                Some(e @ TaskError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
                Some(e @ (TaskError::Rule(_) | TaskError::Invalid(_))) => {
                    warn!("{context}: {e}");
                    (StatusCode::BAD_REQUEST, e.to_string())
                }
                None => {
                    error!("{self}");
                    (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
                }
            },
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type Shared = State<Arc<AppState>>;

/// Build the application router. When `static_dir` is set, unmatched paths
/// are served from it so the browser client can be hosted alongside the API.
pub fn router(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Router {
    let api = Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/create", post(create_task))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/update/{id}", put(update_task))
        .route("/tasks/update-with-subtasks/{id}", put(update_task_tree))
        .route("/tasks/delete/{id}", delete(delete_task))
        .route("/developers", get(list_developers).post(create_developer))
        .route("/developers/{id}", get(get_developer).put(update_developer))
        .route("/skills", get(list_skills))
        .route("/skills/{id}", get(get_skill));

    let mut app = Router::new()
        .route("/health", get(health))
        .nest("/api", api);
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }
    app.layer(CorsLayer::permissive()).with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn create_task(
    State(state): Shared,
    payload: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskView>), ApiError> {
    let Json(payload) = payload?;
    let view = state
        .run("Failed to create task", move |conn, inference| {
            tree::create_task_tree(conn, inference, &payload, None)
        })
        .await?;
    info!("created task {} '{}'", view.task.id, view.task.title);
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list_tasks(State(state): Shared) -> Result<Json<Vec<TaskView>>, ApiError> {
    let tasks = state
        .run("Failed to fetch tasks", |conn, _| ops::list_root_tasks(conn))
        .await?;
    Ok(Json(tasks))
}

async fn get_task(State(state): Shared, Path(id): Path<String>) -> Result<Json<TaskView>, ApiError> {
    let task = state
        .run("Failed to fetch task", move |conn, _| ops::get_task(conn, &id))
        .await?;
    Ok(Json(task))
}

async fn update_task(
    State(state): Shared,
    Path(id): Path<String>,
    payload: Result<Json<TaskUpdate>, JsonRejection>,
) -> Result<Json<TaskView>, ApiError> {
    let Json(update) = payload?;
    let task = state
        .run("Failed to update task", move |conn, _| {
            ops::update_task(conn, &id, &update)
        })
        .await?;
    Ok(Json(task))
}

async fn update_task_tree(
    State(state): Shared,
    Path(id): Path<String>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<TaskView>, ApiError> {
    let Json(patch) = payload?;
    let task = state
        .run("Failed to update task and subtasks", move |conn, inference| {
            tree::update_task_tree(conn, inference, &id, &patch)
        })
        .await?;
    Ok(Json(task))
}

async fn delete_task(State(state): Shared, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let deleted = id.clone();
    state
        .run("Failed to delete task", move |conn, _| ops::delete_task(conn, &id))
        .await?;
    info!("deleted task {deleted}");
    Ok(Json(json!({ "message": "Task deleted successfully" })))
}

async fn list_developers(State(state): Shared) -> Result<Json<Vec<DeveloperView>>, ApiError> {
    let developers = state
        .run("Failed to fetch developers", |conn, _| ops::list_developers(conn))
        .await?;
    Ok(Json(developers))
}

async fn get_developer(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<DeveloperView>, ApiError> {
    let developer = state
        .run("Failed to fetch developer", move |conn, _| ops::get_developer(conn, &id))
        .await?;
    Ok(Json(developer))
}

async fn create_developer(
    State(state): Shared,
    payload: Result<Json<NewDeveloper>, JsonRejection>,
) -> Result<(StatusCode, Json<DeveloperView>), ApiError> {
    let Json(new) = payload?;
    let developer = state
        .run("Failed to create developer", move |conn, _| {
            ops::create_developer(conn, &new)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(developer)))
}

async fn update_developer(
    State(state): Shared,
    Path(id): Path<String>,
    payload: Result<Json<DeveloperUpdate>, JsonRejection>,
) -> Result<Json<DeveloperView>, ApiError> {
    let Json(update) = payload?;
    let developer = state
        .run("Failed to update developer", move |conn, _| {
            ops::update_developer(conn, &id, &update)
        })
        .await?;
    Ok(Json(developer))
}

async fn list_skills(State(state): Shared) -> Result<Json<Vec<SkillView>>, ApiError> {
    let skills = state
        .run("Failed to fetch skills", |conn, _| ops::list_skills(conn))
        .await?;
    Ok(Json(skills))
}

async fn get_skill(State(state): Shared, Path(id): Path<String>) -> Result<Json<SkillView>, ApiError> {
    let skill = state
        .run("Failed to fetch skill", move |conn, _| ops::get_skill(conn, &id))
        .await?;
    Ok(Json(skill))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    fn failed(error: anyhow::Error) -> ApiError {
        ApiError::Failed {
            context: "Failed to delete task",
            error,
        }
    }

    #[test]
    fn classified_errors_map_to_status_codes() {
        let status = status_of(failed(TaskError::NotFound("Task").into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        let status =
            status_of(failed(TaskError::Rule(crate::error::DONE_TASK_DELETE).into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let status = status_of(failed(TaskError::Invalid("bad".into()).into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unclassified_errors_are_internal() {
        let status = status_of(failed(anyhow::anyhow!("disk on fire")));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn context_survives_downcast_through_anyhow_context() {
        use anyhow::Context;
        let err: anyhow::Result<()> =
            Err(anyhow::Error::from(TaskError::NotFound("Task"))).context("while loading");
        let status = status_of(failed(err.unwrap_err()));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
