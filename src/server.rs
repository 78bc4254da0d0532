//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/files/list` | Names of files in the files directory |
//! | `GET`    | `/files/read?filename=` | Content of one file |
//! | `GET`    | `/files/compare?file1_content=&file2_content=` | Create a diff artifact |
//! | `GET`    | `/files/diff/{id}` | Serve a diff artifact |
//! | `GET`    | `/api/files` | File listing with size and mtime |
//! | `GET`    | `/api/docs` | Markdown doc listing with size and mtime |
//! | `POST`   | `/api/upload/{folder}` | Multipart upload (`file` field) |
//! | `DELETE` | `/api/delete/{folder}/{filename}` | Delete a file |
//! | `GET`    | `/api/download/{folder}/{filename}` | Download a file |
//! | `GET`    | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! The `/files` endpoints report errors in their `status` field
//! (`"Error: ..."`); the `/api` endpoints use `{ "error": "..." }`.
//!
//! # Background work
//!
//! [`run_server`] also runs the diff [`Janitor`] and cancels it on graceful
//! shutdown. Handlers move filesystem work and diffing onto the blocking
//! pool with `spawn_blocking`.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{spawn_blocking, JoinError};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::artifact::{ArtifactError, ArtifactStore};
use crate::compare::{compare_and_store, CompareError};
use crate::config::Config;
use crate::files::{self, FileError};
use crate::janitor::Janitor;
use crate::manager::{FileEntry, FileManager, Folder, ManagerError};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    files_dir: Arc<PathBuf>,
    store: ArtifactStore,
    manager: Arc<FileManager>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            files_dir: Arc::new(config.storage.files_dir.clone()),
            store: ArtifactStore::new(&config.storage.diff_dir),
            manager: Arc::new(FileManager::new(&config.storage, &config.upload)),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }
}

/// Builds the router without binding or starting background work.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/files/list", get(handle_list))
        .route("/files/read", get(handle_read))
        .route("/files/compare", get(handle_compare))
        .route("/files/diff/{id}", get(handle_view_diff))
        .route("/api/files", get(handle_api_files))
        .route("/api/docs", get(handle_api_docs))
        .route("/api/upload/{folder}", post(handle_upload))
        .route("/api/delete/{folder}/{filename}", delete(handle_delete))
        .route("/api/download/{folder}/{filename}", get(handle_download))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server and the diff janitor.
///
/// Binds to `[server].bind` and runs until Ctrl-C. On shutdown the janitor
/// is cancelled and awaited before returning.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    for dir in [&config.storage.files_dir, &config.storage.docs_dir] {
        std::fs::create_dir_all(dir)?;
    }

    let state = AppState::from_config(config);

    let shutdown = CancellationToken::new();
    let janitor = Janitor::new(
        state.store().clone(),
        config.janitor.max_age(),
        config.janitor.interval(),
    )
    .spawn(shutdown.clone());

    let app = build_router(state, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        files = %config.storage.files_dir.display(),
        docs = %config.storage.docs_dir.display(),
        diffs = %config.storage.diff_dir.display(),
        "file reader listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    if let Err(e) = janitor.await {
        tracing::error!(error = %e, "diff janitor ended abnormally");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

// ============ Error responses ============

/// `{ "status": "Error: ..." }` body used by the `/files` endpoints.
#[derive(Serialize)]
struct StatusBody {
    status: String,
}

struct StatusError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for StatusError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(StatusBody {
                status: self.message,
            }),
        )
            .into_response()
    }
}

/// `{ "error": "..." }` body used by the `/api` endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<ManagerError> for ApiError {
    fn from(err: ManagerError) -> Self {
        let status = match err {
            ManagerError::NotFound => StatusCode::NOT_FOUND,
            ManagerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ManagerError::InvalidFolder
            | ManagerError::NoFilePart
            | ManagerError::NoSelectedFile
            | ManagerError::ExtensionNotAllowed
            | ManagerError::MarkdownOnly => StatusCode::BAD_REQUEST,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "file operation failed");
        }
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JoinError> for StatusError {
    fn from(err: JoinError) -> Self {
        tracing::error!(error = %err, "blocking task failed");
        StatusError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Error: {}", err),
        }
    }
}

impl From<JoinError> for ApiError {
    fn from(err: JoinError) -> Self {
        tracing::error!(error = %err, "blocking task failed");
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

fn file_error_status(err: &FileError) -> StatusCode {
    match err {
        FileError::FolderNotFound | FileError::FileNotFound => StatusCode::NOT_FOUND,
        FileError::EmptyName
        | FileError::InvalidName(_)
        | FileError::NotAFolder
        | FileError::Io(_) => StatusCode::BAD_REQUEST,
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /files/list ============

#[derive(Debug, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<String>,
    pub status: String,
}

async fn handle_list(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<FileListResponse>), StatusError> {
    let dir = state.files_dir.clone();
    let listed = spawn_blocking(move || files::list_files(&dir)).await?;

    Ok(match listed {
        Ok(files) => (
            StatusCode::OK,
            Json(FileListResponse {
                files,
                status: "Success".to_string(),
            }),
        ),
        Err(e) => (
            file_error_status(&e),
            Json(FileListResponse {
                files: Vec::new(),
                status: format!("Error: {}", e),
            }),
        ),
    })
}

// ============ GET /files/read ============

#[derive(Deserialize)]
struct ReadParams {
    #[serde(default)]
    filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileContentResponse {
    pub content: String,
    pub filename: String,
    pub status: String,
}

async fn handle_read(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
) -> Result<(StatusCode, Json<FileContentResponse>), StatusError> {
    let dir = state.files_dir.clone();
    let filename = params.filename.clone();
    let read = spawn_blocking(move || files::read_file(&dir, &filename)).await?;

    Ok(match read {
        Ok(content) => (
            StatusCode::OK,
            Json(FileContentResponse {
                content,
                filename: params.filename,
                status: "Success".to_string(),
            }),
        ),
        Err(e) => (
            file_error_status(&e),
            Json(FileContentResponse {
                content: String::new(),
                filename: params.filename,
                status: format!("Error: {}", e),
            }),
        ),
    })
}

// ============ GET /files/compare ============

#[derive(Deserialize)]
struct CompareParams {
    #[serde(default)]
    file1_content: String,
    #[serde(default)]
    file2_content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompareResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_url: Option<String>,
}

/// Handler for `GET /files/compare`.
///
/// Always creates an artifact on success, even for two empty inputs.
/// Storage failures are `500`; any other failure is `400`.
async fn handle_compare(
    State(state): State<AppState>,
    Query(params): Query<CompareParams>,
) -> Result<Json<CompareResponse>, StatusError> {
    let store = state.store.clone();
    let comparison = spawn_blocking(move || {
        compare_and_store(&store, &params.file1_content, &params.file2_content)
    })
    .await?
    .map_err(|e| match e {
        CompareError::Store(e) => {
            tracing::error!(error = %e, "error saving diff file");
            StatusError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("Error saving diff file: {}", e),
            }
        }
        other => StatusError {
            status: StatusCode::BAD_REQUEST,
            message: format!("Error: {}", other),
        },
    })?;

    Ok(Json(CompareResponse {
        status: "Success".to_string(),
        diff_url: Some(comparison.url),
    }))
}

// ============ GET /files/diff/{id} ============

async fn handle_view_diff(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, StatusError> {
    let store = state.store.clone();
    match spawn_blocking(move || store.read(&id)).await? {
        Ok(bytes) => Ok((
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            bytes,
        )
            .into_response()),
        Err(e @ ArtifactError::NotFound(_)) => Err(StatusError {
            status: StatusCode::NOT_FOUND,
            message: format!("Error: {}", e),
        }),
        Err(e) => {
            tracing::error!(error = %e, "error reading diff artifact");
            Err(StatusError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("Error: {}", e),
            })
        }
    }
}

// ============ GET /api/files, GET /api/docs ============

async fn handle_api_files(State(state): State<AppState>) -> Result<Json<Vec<FileEntry>>, ApiError> {
    let manager = state.manager.clone();
    Ok(Json(spawn_blocking(move || manager.list_files()).await??))
}

async fn handle_api_docs(State(state): State<AppState>) -> Result<Json<Vec<FileEntry>>, ApiError> {
    let manager = state.manager.clone();
    Ok(Json(spawn_blocking(move || manager.list_docs()).await??))
}

// ============ POST /api/upload/{folder} ============

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Handler for `POST /api/upload/{folder}`.
///
/// Reads the first multipart field named `file`; other fields are skipped.
async fn handle_upload(
    State(state): State<AppState>,
    Path(folder): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, ApiError> {
    let folder: Folder = folder.parse()?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError {
        status: StatusCode::BAD_REQUEST,
        message: e.body_text(),
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| ApiError {
            status: StatusCode::BAD_REQUEST,
            message: e.body_text(),
        })?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or(ManagerError::NoFilePart)?;
    let manager = state.manager.clone();
    spawn_blocking(move || manager.upload(folder, &filename, &bytes)).await??;

    Ok(Json(MessageResponse {
        message: "File uploaded successfully".to_string(),
    }))
}

// ============ DELETE /api/delete/{folder}/{filename} ============

async fn handle_delete(
    State(state): State<AppState>,
    Path((folder, filename)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let folder: Folder = folder.parse()?;
    let manager = state.manager.clone();
    spawn_blocking(move || manager.delete(folder, &filename)).await??;

    Ok(Json(MessageResponse {
        message: "File deleted successfully".to_string(),
    }))
}

// ============ GET /api/download/{folder}/{filename} ============

async fn handle_download(
    State(state): State<AppState>,
    Path((folder, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let folder: Folder = folder.parse()?;
    let manager = state.manager.clone();
    let (name, bytes) = spawn_blocking(move || manager.download(folder, &filename)).await??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        bytes,
    )
        .into_response())
}
