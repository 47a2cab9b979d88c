use tracing::debug;

use sheetlink_graph::AnalysisResult;

use crate::types::{JobProgress, JobState, JobStatus};
use crate::validate::FileCandidate;

/// A file in the current upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub size: u64,
    pub upload_percent: u8,
}

impl From<&FileCandidate> for UploadedFile {
    fn from(f: &FileCandidate) -> Self {
        Self {
            name: f.name.clone(),
            size: f.size,
            upload_percent: 0,
        }
    }
}

/// Current job, its upload batch, and overall upload percent.
#[derive(Debug, Default)]
pub struct JobStore {
    current: Option<JobState>,
    uploaded_files: Vec<UploadedFile>,
    upload_percent: u8,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&JobState> {
        self.current.as_ref()
    }

    pub fn status(&self) -> Option<&JobStatus> {
        self.current.as_ref().map(|j| &j.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_some_and(JobStatus::is_terminal)
    }

    /// Replace the current job outright.
    pub fn set_current_job(&mut self, job: JobProgress) {
        self.current = Some(JobState::from_patch(job));
    }

    /// Merge a progress patch. With no current job the patch becomes the job.
    ///
    /// Writes are applied in arrival order with no sequencing: a late,
    /// stale patch overwrites a newer one.
    pub fn update_progress(&mut self, patch: JobProgress) {
        match &mut self.current {
            Some(job) => job.merge(patch),
            None => self.current = Some(JobState::from_patch(patch)),
        }
    }

    /// Attach the final result and mark the job completed. Ignored when
    /// no job is current.
    pub fn set_result(&mut self, result: AnalysisResult) {
        match &mut self.current {
            Some(job) => {
                job.result = Some(result);
                job.status = JobStatus::Completed;
            }
            None => debug!("Result arrived with no current job, ignoring"),
        }
    }

    pub fn uploaded_files(&self) -> &[UploadedFile] {
        &self.uploaded_files
    }

    pub fn set_uploaded_files(&mut self, files: &[FileCandidate]) {
        self.uploaded_files = files.iter().map(UploadedFile::from).collect();
    }

    pub fn add_uploaded_file(&mut self, file: UploadedFile) {
        self.uploaded_files.push(file);
    }

    pub fn remove_uploaded_file(&mut self, name: &str) {
        self.uploaded_files.retain(|f| f.name != name);
    }

    pub fn update_file_progress(&mut self, name: &str, percent: u8) {
        for file in self.uploaded_files.iter_mut().filter(|f| f.name == name) {
            file.upload_percent = percent.min(100);
        }
    }

    pub fn upload_percent(&self) -> u8 {
        self.upload_percent
    }

    pub fn set_upload_progress(&mut self, percent: u8) {
        self.upload_percent = percent.min(100);
    }

    /// Forget the job and the upload batch.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(pct: f64) -> JobProgress {
        JobProgress {
            progress_percent: Some(pct),
            ..JobProgress::with_status(JobStatus::Running)
        }
    }

    #[test]
    fn first_patch_becomes_the_job() {
        let mut store = JobStore::new();
        assert!(store.current().is_none());
        store.update_progress(JobProgress {
            job_id: Some("j1".into()),
            ..running(10.0)
        });
        let job = store.current().unwrap();
        assert_eq!(job.job_id.as_deref(), Some("j1"));
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn stale_patch_overwrites_newer_progress() {
        // Socket push at 80%, then a late poll response at 40%.
        let mut store = JobStore::new();
        store.set_current_job(JobProgress {
            job_id: Some("j1".into()),
            ..JobProgress::default()
        });
        store.update_progress(running(80.0));
        store.update_progress(running(40.0));
        let pct = store.current().unwrap().progress_percent;
        assert!((pct - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn set_result_requires_a_job() {
        let mut store = JobStore::new();
        store.set_result(AnalysisResult::default());
        assert!(store.current().is_none());

        store.set_current_job(running(99.0));
        store.set_result(AnalysisResult::default());
        let job = store.current().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.is_some());
        assert!(store.is_terminal());
    }

    #[test]
    fn upload_batch_tracking() {
        let mut store = JobStore::new();
        store.set_uploaded_files(&[
            FileCandidate::new("a.csv", 10),
            FileCandidate::new("b.csv", 20),
        ]);
        store.update_file_progress("a.csv", 150);
        store.set_upload_progress(55);
        assert_eq!(store.uploaded_files()[0].upload_percent, 100);
        assert_eq!(store.uploaded_files()[1].upload_percent, 0);
        assert_eq!(store.upload_percent(), 55);

        store.remove_uploaded_file("a.csv");
        assert_eq!(store.uploaded_files().len(), 1);

        store.set_current_job(running(1.0));
        store.clear();
        assert!(store.current().is_none());
        assert!(store.uploaded_files().is_empty());
        assert_eq!(store.upload_percent(), 0);
    }
}
