// Integration test utilities: fixtures and a mock analysis backend.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Json, Multipart, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use sheetlink_core::config::SheetlinkConfig;
use sheetlink_core::validate::FileCandidate;

/// Job id handed out by [`MockBackend`] for every created job.
pub const JOB_ID: &str = "job-1";
/// Preview id in [`preview_response`].
pub const PREVIEW_ID: &str = "pv_1";

// ── Fixtures ─────────────────────────────────────────────────────

/// Completed result envelope: orders and customers, one HIGH and one
/// MEDIUM relationship, plus a LOW one pointing at a file that is not in
/// the result.
pub fn orders_result() -> Value {
    json!({
        "job_id": JOB_ID,
        "status": "completed",
        "completed_at": "2024-05-01T10:00:00Z",
        "result": {
            "files": [
                {
                    "file_name": "orders.xlsx",
                    "sheet_name": "Sheet1",
                    "row_count": 120,
                    "column_count": 3,
                    "columns": [
                        {"column_name": "order_id", "data_type": "integer",
                         "is_primary_key": true, "is_foreign_key": false},
                        {"column_name": "customer_id", "data_type": "integer",
                         "is_primary_key": false, "is_foreign_key": true},
                        {"column_name": "region", "data_type": "string",
                         "is_primary_key": false, "is_foreign_key": false}
                    ]
                },
                {
                    "file_name": "customers.xlsx",
                    "sheet_name": "Sheet1",
                    "row_count": 40,
                    "column_count": 2,
                    "columns": [
                        {"column_name": "id", "data_type": "integer",
                         "is_primary_key": true, "is_foreign_key": false},
                        {"column_name": "region", "data_type": "string",
                         "is_primary_key": false, "is_foreign_key": false}
                    ]
                }
            ],
            "relationships": [
                {
                    "relationship_id": "rel_1",
                    "source": {"file": "orders.xlsx", "column": "customer_id"},
                    "target": {"file": "customers.xlsx", "column": "id"},
                    "relationship_type": "foreign_key",
                    "confidence_level": "HIGH",
                    "confidence_score": 96.5,
                    "business_insights": {
                        "relationship_validity": {"is_valid": true},
                        "decision_making_value": "high"
                    }
                },
                {
                    "relationship_id": "rel_2",
                    "source": {"file": "orders.xlsx", "column": "region"},
                    "target": {"file": "customers.xlsx", "column": "region"},
                    "relationship_type": "shared_dimension",
                    "confidence_level": "MEDIUM",
                    "confidence_score": 71.0,
                    "business_insights": {
                        "relationship_validity": {"is_valid": true},
                        "decision_making_value": "medium"
                    }
                },
                {
                    "relationship_id": "rel_3",
                    "source": {"file": "orders.xlsx", "column": "order_id"},
                    "target": {"file": "invoices.xlsx", "column": "order_ref"},
                    "confidence_level": "LOW",
                    "confidence_score": 22.0
                }
            ],
            "report_metadata": {"analysis_version": "2.1", "total_relationships_found": 3}
        }
    })
}

/// Preview with one file and one duplicate group. `amount_1` is content
/// identical to `amount` and so recommended for deletion; `amount_copy`
/// is not.
pub fn preview_response() -> Value {
    json!({
        "preview_id": PREVIEW_ID,
        "files": [
            {
                "file_id": "file_0123456789ab_sales.xlsx",
                "sheet_name": "Sheet1",
                "row_count": 500,
                "column_count": 4,
                "columns": [],
                "duplicate_groups": [
                    {
                        "columns": ["amount", "amount_1", "amount_copy"],
                        "detection_type": "suffix_pattern",
                        "similarity_score": 98.2,
                        "recommendation": "Keep 'amount'",
                        "metadata": {"content_identical": [true, true, false]}
                    }
                ]
            }
        ]
    })
}

/// `GET /jobs/{id}` body.
pub fn status(status: &str, percent: f64) -> Value {
    json!({"job_id": JOB_ID, "status": status, "progress_percent": percent})
}

/// A socket frame `{type, data}`.
pub fn event(kind: &str, data: Value) -> Value {
    json!({"type": kind, "data": data})
}

/// Scratch directory for files to upload.
#[derive(Debug)]
pub struct UploadDir {
    pub dir: tempfile::TempDir,
}

impl UploadDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `bytes` to `name` and return its path.
    pub fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).expect("write upload file");
        path
    }

    /// Write `name` and stat it into an upload candidate.
    pub fn candidate(&self, name: &str, bytes: &[u8]) -> FileCandidate {
        FileCandidate::from_path(&self.write(name, bytes)).expect("stat upload file")
    }
}

impl Default for UploadDir {
    fn default() -> Self {
        Self::new()
    }
}

// ── Mock backend ─────────────────────────────────────────────────

/// What the job socket does once a client connects.
///
/// Frames are sent as JSON text, except JSON strings, which are sent
/// verbatim so tests can inject malformed frames.
#[derive(Debug, Clone)]
pub enum SocketScript {
    /// Answer the upgrade request with 404.
    Refuse,
    /// Send the frames, then a close frame.
    SendThenClose(Vec<Value>),
    /// Send the frames and keep the connection open until the client
    /// closes it.
    SendThenHold(Vec<Value>),
    /// Send the frames with a pause before each one after the first, then
    /// hold the connection open.
    SendPaced(Vec<Value>, Duration),
}

/// One multipart part received by an upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPart {
    pub field: String,
    pub file_name: String,
    pub size: usize,
}

/// Everything the backend has been asked to do.
#[derive(Debug, Default)]
pub struct Recorded {
    pub job_uploads: Vec<Vec<ReceivedPart>>,
    pub preview_uploads: Vec<Vec<ReceivedPart>>,
    pub status_polls: usize,
    pub socket_attempts: usize,
    pub confirmations: Vec<(String, Value)>,
    pub deleted_jobs: Vec<String>,
    pub cancelled_previews: Vec<String>,
}

#[derive(Debug)]
struct Script {
    statuses: Vec<Value>,
    result: Value,
    preview: Value,
    socket: SocketScript,
    failure: Option<(StatusCode, Value)>,
}

#[derive(Debug)]
struct Shared {
    script: Script,
    recorded: Recorded,
}

type AppState = Arc<Mutex<Shared>>;

fn lock(state: &AppState) -> MutexGuard<'_, Shared> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-process analysis backend on `127.0.0.1`, serving the REST routes
/// under `/api/v1` and the per-job WebSocket.
///
/// Status polls walk through the configured sequence and then repeat its
/// last entry. The server stops when the value is dropped.
#[derive(Debug)]
pub struct MockBackend {
    addr: SocketAddr,
    state: AppState,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Start with a completed status, [`orders_result`],
    /// [`preview_response`] and a socket that reports completion.
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(Shared {
            script: Script {
                statuses: vec![status("completed", 100.0)],
                result: orders_result(),
                preview: preview_response(),
                socket: SocketScript::SendThenHold(vec![
                    event("connected", json!({"job_id": JOB_ID})),
                    event("completed", json!({})),
                ]),
                failure: None,
            },
            recorded: Recorded::default(),
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");
        let app = router(Arc::clone(&state));
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!(error = %e, "Mock backend stopped");
            }
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn api_base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_base_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Client config pointing at this backend, polling every 20 ms.
    pub fn config(&self) -> SheetlinkConfig {
        let mut config = SheetlinkConfig::default();
        config.server.api_base_url = self.api_base_url();
        config.server.ws_base_url = self.ws_base_url();
        config.monitor.poll_interval_ms = 20;
        config
    }

    pub fn set_statuses(&self, statuses: Vec<Value>) {
        lock(&self.state).script.statuses = statuses;
    }

    pub fn set_result(&self, result: Value) {
        lock(&self.state).script.result = result;
    }

    pub fn set_socket(&self, script: SocketScript) {
        lock(&self.state).script.socket = script;
    }

    /// Answer every REST request with `status` and `body` from now on.
    pub fn fail_with(&self, status: u16, body: Value) {
        let status = StatusCode::from_u16(status).expect("valid HTTP status");
        lock(&self.state).script.failure = Some((status, body));
    }

    /// Inspect what the backend has received so far.
    pub fn recorded<R>(&self, f: impl FnOnce(&Recorded) -> R) -> R {
        f(&lock(&self.state).recorded)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/jobs", post(create_job))
        .route("/api/v1/jobs/preview", post(create_preview))
        .route("/api/v1/jobs/preview/:id", delete(cancel_preview))
        .route("/api/v1/jobs/preview/:id/confirm", post(confirm_preview))
        .route("/api/v1/jobs/:id", get(job_status).delete(delete_job))
        .route("/api/v1/jobs/:id/result", get(job_result))
        .route("/api/v1/jobs/:id/ws", get(job_socket))
        .with_state(state)
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"detail": {"error": {"code": "NOT_FOUND", "message": message}}})),
    )
        .into_response()
}

fn injected_failure(state: &AppState) -> Option<Response> {
    lock(state)
        .script
        .failure
        .clone()
        .map(|(status, body)| (status, Json(body)).into_response())
}

async fn read_parts(mut multipart: Multipart) -> Result<Vec<ReceivedPart>, Response> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(IntoResponse::into_response)?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(IntoResponse::into_response)?;
        parts.push(ReceivedPart {
            field: field_name,
            file_name,
            size: bytes.len(),
        });
    }
    Ok(parts)
}

// ── Handlers ─────────────────────────────────────────────────────

async fn create_job(State(state): State<AppState>, multipart: Multipart) -> Response {
    if let Some(resp) = injected_failure(&state) {
        return resp;
    }
    let parts = match read_parts(multipart).await {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };
    let file_count = parts.len();
    lock(&state).recorded.job_uploads.push(parts);
    Json(json!({
        "job_id": JOB_ID,
        "status": "pending",
        "created_at": "2024-05-01T09:59:00Z",
        "file_count": file_count,
    }))
    .into_response()
}

async fn job_status(State(state): State<AppState>, UrlPath(id): UrlPath<String>) -> Response {
    if let Some(resp) = injected_failure(&state) {
        return resp;
    }
    let mut guard = lock(&state);
    let shared = &mut *guard;
    shared.recorded.status_polls += 1;
    if id != JOB_ID {
        return error_body(StatusCode::NOT_FOUND, &format!("Job {id} not found"));
    }
    let statuses = &shared.script.statuses;
    let index = (shared.recorded.status_polls - 1).min(statuses.len().saturating_sub(1));
    match statuses.get(index) {
        Some(body) => Json(body.clone()).into_response(),
        None => error_body(StatusCode::NOT_FOUND, &format!("Job {id} not found")),
    }
}

async fn job_result(State(state): State<AppState>, UrlPath(id): UrlPath<String>) -> Response {
    if let Some(resp) = injected_failure(&state) {
        return resp;
    }
    if id != JOB_ID {
        return error_body(StatusCode::NOT_FOUND, &format!("Job {id} not found"));
    }
    Json(lock(&state).script.result.clone()).into_response()
}

async fn delete_job(State(state): State<AppState>, UrlPath(id): UrlPath<String>) -> Response {
    if let Some(resp) = injected_failure(&state) {
        return resp;
    }
    lock(&state).recorded.deleted_jobs.push(id.clone());
    Json(json!({"message": "Job deleted", "job_id": id})).into_response()
}

async fn create_preview(State(state): State<AppState>, multipart: Multipart) -> Response {
    if let Some(resp) = injected_failure(&state) {
        return resp;
    }
    let parts = match read_parts(multipart).await {
        Ok(parts) => parts,
        Err(resp) => return resp,
    };
    let mut shared = lock(&state);
    shared.recorded.preview_uploads.push(parts);
    Json(shared.script.preview.clone()).into_response()
}

async fn confirm_preview(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(resp) = injected_failure(&state) {
        return resp;
    }
    if id != PREVIEW_ID {
        return error_body(StatusCode::NOT_FOUND, "Preview not found or expired");
    }
    let removed: usize = body["file_selections"]
        .as_array()
        .map(|files| {
            files
                .iter()
                .filter_map(|f| f["columns_to_delete"].as_array())
                .map(Vec::len)
                .sum()
        })
        .unwrap_or_default();
    lock(&state).recorded.confirmations.push((id, body));
    Json(json!({
        "job_id": JOB_ID,
        "status": "pending",
        "columns_removed": {"total": removed},
    }))
    .into_response()
}

async fn cancel_preview(State(state): State<AppState>, UrlPath(id): UrlPath<String>) -> Response {
    if let Some(resp) = injected_failure(&state) {
        return resp;
    }
    lock(&state).recorded.cancelled_previews.push(id);
    StatusCode::NO_CONTENT.into_response()
}

async fn job_socket(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let script = {
        let mut shared = lock(&state);
        shared.recorded.socket_attempts += 1;
        shared.script.socket.clone()
    };
    match script {
        SocketScript::Refuse => error_body(StatusCode::NOT_FOUND, &format!("Job {id} not found")),
        SocketScript::SendThenClose(frames) => {
            ws.on_upgrade(move |socket| play(socket, frames, Duration::ZERO, true))
        }
        SocketScript::SendThenHold(frames) => {
            ws.on_upgrade(move |socket| play(socket, frames, Duration::ZERO, false))
        }
        SocketScript::SendPaced(frames, pause) => {
            ws.on_upgrade(move |socket| play(socket, frames, pause, false))
        }
    }
}

async fn play(mut socket: WebSocket, frames: Vec<Value>, pause: Duration, close: bool) {
    for (i, frame) in frames.into_iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        let text = match frame {
            Value::String(raw) => raw,
            other => other.to_string(),
        };
        if socket.send(Message::Text(text)).await.is_err() {
            return;
        }
    }
    if close {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(msg)) = socket.recv().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
}
