//! One analysis from upload to export.
//!
//! The session owns the job, graph and preview stores and applies the
//! cross-store steps: a new upload clears the previous job and graph, and a
//! loaded result feeds both the job store and the graph store.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use sheetlink_graph::{result_document_from_value, transform};

use crate::error::{ExportError, Result, ValidationError};
use crate::export;
use crate::response_check::{ResponseReport, check_response};
use crate::store::{GraphStore, JobStore, PreviewStore};
use crate::types::{CreateJobResponse, JobEvent, JobProgress, JobStatus};
use crate::validate::FileCandidate;

#[derive(Debug, Default)]
pub struct AnalysisSession {
    pub job: JobStore,
    pub graph: GraphStore,
    pub preview: PreviewStore,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new batch: forget the previous job and graph and record the
    /// files being uploaded.
    pub fn begin_upload(&mut self, files: &[FileCandidate]) {
        self.job.clear();
        self.graph.clear();
        self.job.set_uploaded_files(files);
    }

    /// Adopt the job the backend just created.
    pub fn begin_job(&mut self, created: CreateJobResponse) {
        self.job.set_upload_progress(100);
        self.job.set_current_job(JobProgress::from(created));
    }

    /// Merge a socket event into the current job.
    pub fn apply_event(&mut self, event: JobEvent) {
        debug!(kind = event.kind(), "Applying job event");
        if let Some(patch) = event.into_patch() {
            self.job.update_progress(patch);
        }
    }

    /// Load a result document (envelope or bare result) into the job and
    /// graph stores.
    ///
    /// Envelopes whose status is not `completed` are rejected. The document
    /// is shape-checked first; the returned report is informational only.
    pub fn load_result(&mut self, document: &Value) -> Result<ResponseReport> {
        let envelope = result_document_from_value(document.clone())?;
        if let Some(status) = envelope.status.as_deref().filter(|_| !envelope.is_completed()) {
            return Err(ValidationError::NotReady {
                status: status.to_string(),
            }
            .into());
        }

        let report = check_response(document);
        report.log();

        let result = envelope.result.unwrap_or_default();
        if self.job.current().is_none() {
            self.job.set_current_job(JobProgress {
                job_id: envelope.job_id,
                completed_at: envelope.completed_at,
                ..JobProgress::with_status(JobStatus::Completed)
            });
        }

        let model = transform(&result);
        info!(
            nodes = model.nodes.len(),
            edges = model.edges.len(),
            dropped = model.dropped.len(),
            "Result loaded"
        );
        self.job.set_result(result);
        self.graph.load(model);
        Ok(report)
    }

    /// Write the full report, or only the visible relationships when
    /// `filtered` is set.
    pub fn export(
        &self,
        dir: &Path,
        filtered: bool,
        now: DateTime<Utc>,
    ) -> std::result::Result<PathBuf, ExportError> {
        let job = self.job.current().ok_or(ExportError::NothingToExport)?;
        if filtered {
            export::export_filtered(
                dir,
                job,
                &self.graph.visible_relationship_ids(),
                self.graph.filter(),
                now,
            )
        } else {
            export::export_full(dir, job, now)
        }
    }

    /// Start over: every store returns to its initial state.
    pub fn reset(&mut self) {
        self.job.clear();
        self.graph.clear();
        self.preview.reset();
    }
}
