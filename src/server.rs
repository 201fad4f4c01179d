//! HTTP API over the page and stroke store.
//!
//! Storage calls are synchronous file I/O, so every handler hands its work
//! to the blocking pool. Errors come back as `{ "error", "kind" }` with a
//! status chosen so that the sync client can tell a rejected batch (4xx)
//! from a temporarily unavailable server (5xx).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

use crate::storage::{
    FileStorage, NotebookMeta, PageMeta, PageUpdate, Stroke, StorageError, StrokeStore,
};

/// Stroke batches from a long offline session can be large.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub type SharedStorage = Arc<FileStorage>;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            kind: "internal",
            message: message.into(),
        }
    }

    fn bad_body(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalidBody",
            message: message.into(),
        }
    }
}

pub fn status_for(error: &StorageError) -> StatusCode {
    match error {
        StorageError::NotebookNotFound(_)
        | StorageError::PageNotFound(_)
        | StorageError::StrokeNotFound { .. } => StatusCode::NOT_FOUND,
        StorageError::AlreadyInTarget { .. } | StorageError::DuplicatePage(_) => {
            StatusCode::CONFLICT
        }
        StorageError::InvalidId(_)
        | StorageError::InvalidStroke(_)
        | StorageError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
        StorageError::RecoveryPending(_) => StatusCode::SERVICE_UNAVAILABLE,
        StorageError::Io(_) | StorageError::Json(_) | StorageError::DataDirNotFound => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        let status = status_for(&error);
        if status.is_server_error() {
            log::error!("Storage error: {}", error);
        }
        Self {
            status,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            kind: "invalidBody",
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.message, "kind": self.kind });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run a storage call on the blocking pool.
async fn blocking<T, F>(storage: &SharedStorage, f: F) -> ApiResult<T>
where
    F: FnOnce(&FileStorage) -> crate::storage::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let storage = Arc::clone(storage);
    tokio::task::spawn_blocking(move || f(&storage))
        .await
        .map_err(|e| ApiError::internal(format!("storage task failed: {}", e)))?
        .map_err(ApiError::from)
}

// ===== Request / response bodies =====

#[derive(Deserialize)]
pub struct CreateNotebookRequest {
    pub title: String,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreatePageRequest {
    #[serde(default)]
    pub canvas_x: f64,
    #[serde(default)]
    pub canvas_y: f64,
}

#[derive(Serialize, Deserialize)]
pub struct AppendStrokesRequest {
    pub strokes: Vec<Stroke>,
}

#[derive(Serialize, Deserialize)]
pub struct AppendStrokesResponse {
    pub count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePagesRequest {
    pub page_ids: Vec<String>,
    pub target_notebook_id: String,
}

// ===== Handlers =====

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_notebooks(State(storage): State<SharedStorage>) -> ApiResult<Json<Vec<NotebookMeta>>> {
    blocking(&storage, |s| s.list_notebooks()).await.map(Json)
}

async fn create_notebook(
    State(storage): State<SharedStorage>,
    payload: Result<Json<CreateNotebookRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<NotebookMeta>)> {
    let Json(req) = payload?;
    let notebook = blocking(&storage, move |s| s.create_notebook(req.title, req.settings)).await?;
    Ok((StatusCode::CREATED, Json(notebook)))
}

async fn get_notebook(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<NotebookMeta>> {
    blocking(&storage, move |s| s.get_notebook(&id)).await.map(Json)
}

async fn delete_notebook(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    blocking(&storage, move |s| s.delete_notebook(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_pages(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PageMeta>>> {
    blocking(&storage, move |s| s.list_pages(&id)).await.map(Json)
}

async fn create_page(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<PageMeta>)> {
    // The body is optional; an empty POST places the page at the origin.
    let req: CreatePageRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CreatePageRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_body(e.to_string()))?
    };
    let page = blocking(&storage, move |s| s.create_page(&id, req.canvas_x, req.canvas_y)).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn get_page(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<PageMeta>> {
    blocking(&storage, move |s| s.get_page(&id)).await.map(Json)
}

async fn update_page(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
    payload: Result<Json<PageUpdate>, JsonRejection>,
) -> ApiResult<Json<PageMeta>> {
    let Json(update) = payload?;
    blocking(&storage, move |s| s.update_page(&id, update)).await.map(Json)
}

async fn delete_page(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    blocking(&storage, move |s| s.delete_page(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn move_pages(
    State(storage): State<SharedStorage>,
    payload: Result<Json<MovePagesRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<PageMeta>>> {
    let Json(req) = payload?;
    blocking(&storage, move |s| s.move_pages(&req.page_ids, &req.target_notebook_id))
        .await
        .map(Json)
}

async fn list_strokes(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Stroke>>> {
    blocking(&storage, move |s| s.list(&id)).await.map(Json)
}

async fn append_strokes(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
    payload: Result<Json<AppendStrokesRequest>, JsonRejection>,
) -> ApiResult<Json<AppendStrokesResponse>> {
    let Json(req) = payload?;
    let count = blocking(&storage, move |s| s.append(&id, &req.strokes)).await?;
    Ok(Json(AppendStrokesResponse { count }))
}

async fn clear_strokes(
    State(storage): State<SharedStorage>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    blocking(&storage, move |s| s.clear(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_stroke(
    State(storage): State<SharedStorage>,
    Path((page_id, stroke_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    blocking(&storage, move |s| s.delete(&page_id, &stroke_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build the API router over `storage`.
pub fn router(storage: SharedStorage) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/notebooks", get(list_notebooks).post(create_notebook))
        .route("/api/notebooks/{id}", get(get_notebook).delete(delete_notebook))
        .route("/api/notebooks/{id}/pages", get(list_pages).post(create_page))
        .route("/api/pages/move", post(move_pages))
        .route(
            "/api/pages/{id}",
            get(get_page).patch(update_page).delete(delete_page),
        )
        .route(
            "/api/pages/{id}/strokes",
            get(list_strokes).post(append_strokes).delete(clear_strokes),
        )
        .route(
            "/api/pages/{id}/strokes/{stroke_id}",
            axum::routing::delete(delete_stroke),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(storage)
}

/// Handle for a running API server.
pub struct StrokeServer {
    /// Address the server is listening on.
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl StrokeServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for in-flight requests to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for StrokeServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind `addr` and serve the API in a background task.
pub async fn start_server(storage: SharedStorage, addr: SocketAddr) -> std::io::Result<StrokeServer> {
    let app = router(storage);

    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    log::info!("Stroke API server listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                log::info!("Stroke API server shutting down");
            })
            .await;
        if let Err(e) = result {
            log::error!("Stroke API server failed: {}", e);
        }
    });

    Ok(StrokeServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&StorageError::PageNotFound("p".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&StorageError::StrokeNotFound {
                page_id: "p".into(),
                stroke_id: "s".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&StorageError::AlreadyInTarget {
                page_id: "p".into(),
                notebook_id: "n".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&StorageError::InvalidStroke("too short".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&StorageError::RecoveryPending("io".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&StorageError::Io(std::io::Error::other("disk"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
