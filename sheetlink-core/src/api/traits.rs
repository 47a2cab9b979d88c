use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::progress::ProgressReporter;
use crate::types::{
    ConfirmPreviewRequest, ConfirmPreviewResponse, CreateJobResponse, JobProgress,
    PreviewResponse,
};
use crate::validate::FileCandidate;

/// REST operations against the analysis backend.
///
/// Upload progress is reported in bytes sent through `progress`.
#[async_trait::async_trait]
pub trait JobsApi: Send + Sync {
    /// `POST /jobs` with the files as multipart `files` parts.
    async fn create_job(
        &self,
        files: &[FileCandidate],
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<CreateJobResponse>;

    /// `GET /jobs/{id}`.
    async fn job_status(&self, job_id: &str) -> Result<JobProgress>;

    /// `GET /jobs/{id}/result`, undecoded so the response checker sees the
    /// document exactly as sent.
    async fn job_result(&self, job_id: &str) -> Result<Value>;

    /// `DELETE /jobs/{id}`.
    async fn delete_job(&self, job_id: &str) -> Result<Value>;

    /// `POST /jobs/preview` with the files as multipart `files` parts.
    async fn create_preview(
        &self,
        files: &[FileCandidate],
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<PreviewResponse>;

    /// `POST /jobs/preview/{id}/confirm`.
    async fn confirm_preview(
        &self,
        preview_id: &str,
        request: &ConfirmPreviewRequest,
    ) -> Result<ConfirmPreviewResponse>;

    /// `DELETE /jobs/preview/{id}`.
    async fn cancel_preview(&self, preview_id: &str) -> Result<()>;
}
