// REST client for the analysis backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::SheetlinkConfig;
use crate::error::{ApiError, Result};
use crate::progress::ProgressReporter;
use crate::types::{
    ConfirmPreviewRequest, ConfirmPreviewResponse, CreateJobResponse, JobProgress,
    PreviewResponse,
};
use crate::validate::FileCandidate;

use super::traits::JobsApi;

const GENERIC_ERROR: &str = "An error occurred";
const UPLOAD_CHUNK: usize = 64 * 1024;

/// `reqwest`-backed [`JobsApi`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base: String,
    upload_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &SheetlinkConfig) -> Result<Self> {
        // reqwest is built without a bundled crypto provider.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("sheetlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base: config.api_root(),
            upload_timeout: config.upload_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await.map_err(transport_error)?;
        decode(resp).await
    }

    async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        files: &[FileCandidate],
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<T> {
        let form = multipart_form(files, Arc::clone(&progress)).await?;
        let url = self.url(path);
        debug!(url = %url, files = files.len(), "Uploading");
        let result = self
            .send(
                self.client
                    .post(&url)
                    .timeout(self.upload_timeout)
                    .multipart(form),
            )
            .await;
        progress.finish();
        result
    }
}

#[async_trait::async_trait]
impl JobsApi for ApiClient {
    #[instrument(skip_all, name = "create_job")]
    async fn create_job(
        &self,
        files: &[FileCandidate],
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<CreateJobResponse> {
        let created: CreateJobResponse = self.upload("/jobs", files, progress).await?;
        info!(job_id = %created.job_id, "Job created");
        Ok(created)
    }

    async fn job_status(&self, job_id: &str) -> Result<JobProgress> {
        let url = self.url(&format!("/jobs/{job_id}"));
        debug!(url = %url, "Polling job status");
        self.send(self.client.get(&url)).await
    }

    #[instrument(skip(self))]
    async fn job_result(&self, job_id: &str) -> Result<Value> {
        self.send(self.client.get(self.url(&format!("/jobs/{job_id}/result"))))
            .await
    }

    #[instrument(skip(self))]
    async fn delete_job(&self, job_id: &str) -> Result<Value> {
        self.send(self.client.delete(self.url(&format!("/jobs/{job_id}"))))
            .await
    }

    #[instrument(skip_all, name = "create_preview")]
    async fn create_preview(
        &self,
        files: &[FileCandidate],
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<PreviewResponse> {
        let preview: PreviewResponse = self.upload("/jobs/preview", files, progress).await?;
        info!(preview_id = %preview.preview_id, files = preview.files.len(), "Preview ready");
        Ok(preview)
    }

    #[instrument(skip(self, request))]
    async fn confirm_preview(
        &self,
        preview_id: &str,
        request: &ConfirmPreviewRequest,
    ) -> Result<ConfirmPreviewResponse> {
        let url = self.url(&format!("/jobs/preview/{preview_id}/confirm"));
        self.send(self.client.post(url).json(request)).await
    }

    #[instrument(skip(self))]
    async fn cancel_preview(&self, preview_id: &str) -> Result<()> {
        let _: Value = self
            .send(self.client.delete(self.url(&format!("/jobs/preview/{preview_id}"))))
            .await?;
        Ok(())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout(e.to_string())
    } else if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = extract_error_message(&body);
        warn!(status = status.as_u16(), message = %message, "Backend returned an error");
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        }
        .into());
    }

    let body = resp.text().await.map_err(transport_error)?;
    // 204 and empty bodies decode as JSON null.
    let body = if body.trim().is_empty() { "null" } else { &body };
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()).into())
}

/// Pull a user-facing message out of an error response body.
///
/// Tries `error.message`, then `detail.error.message`, then a string
/// `detail`, and falls back to a generic message.
pub fn extract_error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return GENERIC_ERROR.to_string();
    };
    let nonempty = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    nonempty(value.pointer("/error/message"))
        .or_else(|| nonempty(value.pointer("/detail/error/message")))
        .or_else(|| nonempty(value.get("detail")))
        .unwrap_or_else(|| GENERIC_ERROR.to_string())
}

/// Build the `files` multipart body. File bytes go out in chunks and the
/// reporter's position tracks bytes handed to the transport.
async fn multipart_form(
    files: &[FileCandidate],
    progress: Arc<dyn ProgressReporter>,
) -> Result<Form> {
    let mut payloads = Vec::with_capacity(files.len());
    for file in files {
        let bytes = tokio::fs::read(&file.path).await?;
        payloads.push((file.name.clone(), bytes));
    }

    let total: u64 = payloads.iter().map(|(_, b)| b.len() as u64).sum();
    progress.start("Uploading", Some(total));

    let sent = Arc::new(AtomicU64::new(0));
    let mut form = Form::new();
    for (name, bytes) in payloads {
        let len = bytes.len() as u64;
        let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK).map(<[u8]>::to_vec).collect();
        let sent = Arc::clone(&sent);
        let progress = Arc::clone(&progress);
        let stream = futures_util::stream::iter(chunks).map(move |chunk| {
            let n = chunk.len() as u64;
            let pos = sent.fetch_add(n, Ordering::Relaxed) + n;
            progress.set_position(pos);
            Ok::<_, std::io::Error>(chunk)
        });
        let part = Part::stream_with_length(Body::wrap_stream(stream), len).file_name(name);
        form = form.part("files", part);
    }
    Ok(form)
}
