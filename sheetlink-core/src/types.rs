use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sheetlink_graph::{AnalysisResult, ColumnProfile};

// ── Open string enums ──────────────────────────────────────────────

/// Enum over the wire strings the backend is known to send, keeping any
/// other value verbatim in `Other`.
macro_rules! open_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Other(s) => s.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                match s.as_str() {
                    $($wire => Self::$variant,)+
                    _ => Self::Other(s),
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from(s.to_string())
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> String {
                match v {
                    $name::Other(s) => s,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

open_enum!(
    /// Lifecycle status of a backend job.
    JobStatus {
        Pending => "pending",
        Queued => "queued",
        Running => "running",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
);

impl Default for JobStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl JobStatus {
    /// Monitoring stops once a job reaches one of these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

open_enum!(
    /// Analysis pipeline stage reported in `current_stage`.
    JobStage {
        LoadingFiles => "loading_files",
        ProfilingData => "profiling_data",
        DetectingRelationships => "detecting_relationships",
        LlmValidation => "llm_validation",
        BusinessValidation => "business_validation",
        GeneratingReport => "generating_report",
    }
);

impl JobStage {
    pub const COUNT: usize = 6;

    /// 1-based position in the pipeline; `None` for stages this client
    /// does not know.
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            Self::LoadingFiles => Some(1),
            Self::ProfilingData => Some(2),
            Self::DetectingRelationships => Some(3),
            Self::LlmValidation => Some(4),
            Self::BusinessValidation => Some(5),
            Self::GeneratingReport => Some(6),
            Self::Other(_) => None,
        }
    }

    /// Human-readable description. Unknown stages are shown verbatim.
    pub fn message(&self) -> &str {
        match self {
            Self::LoadingFiles => "Reading Excel files and validating structure...",
            Self::ProfilingData => "Analyzing column patterns and data types...",
            Self::DetectingRelationships => "Finding potential matches across columns...",
            Self::LlmValidation => "Asking AI to validate relationships...",
            Self::BusinessValidation => {
                "Evaluating business insights for discovered relationships..."
            }
            Self::GeneratingReport => "Preparing your analysis report...",
            Self::Other(s) => s.as_str(),
        }
    }
}

open_enum!(
    /// How the backend decided a group of columns are duplicates.
    DetectionType {
        ExactName => "exact_name",
        SuffixPattern => "suffix_pattern",
        ContentSimilar => "content_similar",
        FuzzyName => "fuzzy_name",
        LlmSemantic => "llm_semantic",
    }
);

impl DetectionType {
    pub fn label(&self) -> &str {
        match self {
            Self::ExactName => "Exact Name Match",
            Self::SuffixPattern => "Suffix Pattern",
            Self::ContentSimilar => "Content Similar",
            Self::FuzzyName => "Fuzzy Name Match",
            Self::LlmSemantic => "LLM Semantic",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl Default for DetectionType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

// ── Job progress ───────────────────────────────────────────────────

/// A partial job update from a status poll or a socket frame.
///
/// Every field is optional; absent fields leave the current job state
/// untouched when merged. Fields this client does not model are kept in
/// `extra` and merged key by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<JobStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships_found: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobProgress {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Decode a patch from a JSON value; `null` is an empty patch.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
    }
}

/// The current job as held by the job store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobState {
    pub job_id: Option<String>,
    pub status: JobStatus,
    pub progress_percent: f64,
    pub current_stage: Option<JobStage>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub file_count: Option<u64>,
    pub relationships_found: Option<u64>,
    pub created_at: Option<String>,
    pub completed_at: Option<String>,
    pub extra: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
}

impl JobState {
    pub fn from_patch(patch: JobProgress) -> Self {
        let mut state = Self::default();
        state.merge(patch);
        state
    }

    /// Shallow merge: present fields overwrite, absent fields are kept.
    pub fn merge(&mut self, patch: JobProgress) {
        let JobProgress {
            job_id,
            status,
            progress_percent,
            current_stage,
            message,
            error,
            file_count,
            relationships_found,
            created_at,
            completed_at,
            extra,
        } = patch;

        if job_id.is_some() {
            self.job_id = job_id;
        }
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(p) = progress_percent {
            self.progress_percent = p;
        }
        if current_stage.is_some() {
            self.current_stage = current_stage;
        }
        if message.is_some() {
            self.message = message;
        }
        if error.is_some() {
            self.error = error;
        }
        if file_count.is_some() {
            self.file_count = file_count;
        }
        if relationships_found.is_some() {
            self.relationships_found = relationships_found;
        }
        if created_at.is_some() {
            self.created_at = created_at;
        }
        if completed_at.is_some() {
            self.completed_at = completed_at;
        }
        self.extra.extend(extra);
    }
}

// ── Socket events ──────────────────────────────────────────────────

/// One decoded WebSocket frame: `{type, data}`.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Connected(JobProgress),
    Progress(JobProgress),
    Completed(JobProgress),
    Error { error: Option<String> },
    Unknown(String),
}

impl JobEvent {
    /// Parse a text frame. Fails only when the frame is not a JSON object
    /// or its `data` does not fit a progress patch.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct Frame {
            #[serde(rename = "type", default)]
            kind: String,
            #[serde(default)]
            data: Value,
        }

        let frame: Frame = serde_json::from_str(text)?;
        Ok(match frame.kind.as_str() {
            "connected" => Self::Connected(JobProgress::from_value(frame.data)?),
            "progress" => Self::Progress(JobProgress::from_value(frame.data)?),
            "completed" => Self::Completed(JobProgress::from_value(frame.data)?),
            "error" => Self::Error {
                error: match frame.data.get("error") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => Some(other.to_string()),
                },
            },
            other => Self::Unknown(other.to_string()),
        })
    }

    /// The job-state patch this event applies, if any.
    ///
    /// `completed` merges its data and then forces `completed`/100;
    /// `error` marks the job failed.
    pub fn into_patch(self) -> Option<JobProgress> {
        match self {
            Self::Connected(p) | Self::Progress(p) => Some(p),
            Self::Completed(mut p) => {
                p.status = Some(JobStatus::Completed);
                p.progress_percent = Some(100.0);
                Some(p)
            }
            Self::Error { error } => Some(JobProgress {
                error,
                ..JobProgress::with_status(JobStatus::Failed)
            }),
            Self::Unknown(_) => None,
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::Connected(_) => "connected",
            Self::Progress(_) => "progress",
            Self::Completed(_) => "completed",
            Self::Error { .. } => "error",
            Self::Unknown(kind) => kind.as_str(),
        }
    }
}

// ── REST payloads ──────────────────────────────────────────────────

/// `POST /jobs` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateJobResponse {
    pub job_id: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub file_count: Option<u64>,
}

impl From<CreateJobResponse> for JobProgress {
    fn from(r: CreateJobResponse) -> Self {
        Self {
            job_id: Some(r.job_id),
            status: Some(r.status),
            created_at: r.created_at,
            file_count: r.file_count,
            ..Self::default()
        }
    }
}

/// Columns to drop from one previewed file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSelection {
    pub file_id: String,
    pub columns_to_delete: Vec<String>,
}

/// `POST /jobs/preview/{id}/confirm` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPreviewRequest {
    pub file_selections: Vec<FileSelection>,
}

/// `POST /jobs/preview/{id}/confirm` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfirmPreviewResponse {
    pub job_id: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub columns_removed: Option<Value>,
}

// ── Preview ────────────────────────────────────────────────────────

/// `POST /jobs/preview` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub preview_id: String,
    #[serde(default)]
    pub files: Vec<FilePreview>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilePreview {
    pub file_id: String,
    #[serde(default)]
    pub original_filename: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub row_count: u64,
    #[serde(default)]
    pub column_count: u64,
    #[serde(default)]
    pub columns: Vec<ColumnProfile>,
    #[serde(default)]
    pub duplicate_groups: Vec<DuplicateGroup>,
}

impl FilePreview {
    /// Name to show for the file: the original upload name when the backend
    /// sent one, otherwise the file id with its storage prefix stripped.
    pub fn display_name(&self) -> String {
        self.original_filename
            .clone()
            .unwrap_or_else(|| crate::format::extract_original_filename(&self.file_id).to_string())
    }
}

/// Columns the backend believes duplicate each other. `columns[0]` is
/// always the one to keep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub columns: Vec<String>,
    #[serde(default)]
    pub detection_type: DetectionType,
    #[serde(default)]
    pub similarity_score: f64,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub metadata: Option<DuplicateMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateMetadata {
    /// Aligned with `DuplicateGroup::columns`, entry 0 included.
    #[serde(default)]
    pub content_identical: Vec<Value>,
    #[serde(default)]
    pub sample_comparison: BTreeMap<String, Vec<Value>>,
}

impl DuplicateGroup {
    /// Whether `columns[index]` has content identical to the kept column.
    /// Any truthy JSON value counts.
    pub fn is_content_identical(&self, index: usize) -> bool {
        self.metadata
            .as_ref()
            .and_then(|m| m.content_identical.get(index))
            .is_some_and(truthy)
    }

    /// Columns recommended for deletion: `columns[i]` for `i >= 1` where
    /// `content_identical[i]` is truthy. The index is into `columns`, not
    /// into the tail after the kept column.
    pub fn recommended_deletions(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(i, _)| self.is_content_identical(*i))
            .map(|(_, c)| c.as_str())
    }
}

/// JSON truthiness. Falsy values are `null`, `false`, `0` and `""`.
pub(crate) fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_status_round_trips_unknown_values() {
        let s: JobStatus = serde_json::from_value(json!("running")).unwrap();
        assert_eq!(s, JobStatus::Running);
        let s: JobStatus = serde_json::from_value(json!("paused")).unwrap();
        assert_eq!(s, JobStatus::Other("paused".into()));
        assert_eq!(serde_json::to_value(&s).unwrap(), json!("paused"));
        assert!(!s.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
    }

    #[test]
    fn stage_ordinal_and_message() {
        assert_eq!(JobStage::from("llm_validation").ordinal(), Some(4));
        assert_eq!(
            JobStage::from("loading_files").message(),
            "Reading Excel files and validating structure..."
        );
        let unknown = JobStage::from("warming_up");
        assert_eq!(unknown.ordinal(), None);
        assert_eq!(unknown.message(), "warming_up");
    }

    #[test]
    fn progress_patch_keeps_extras() {
        let p: JobProgress = serde_json::from_value(json!({
            "status": "running",
            "progress_percent": 42.5,
            "current_stage": "profiling_data",
            "eta_seconds": 30
        }))
        .unwrap();
        assert_eq!(p.status, Some(JobStatus::Running));
        assert_eq!(p.extra.get("eta_seconds"), Some(&json!(30)));
    }

    #[test]
    fn merge_overwrites_present_fields_only() {
        let mut state = JobState::from_patch(JobProgress {
            job_id: Some("j1".into()),
            file_count: Some(2),
            ..JobProgress::with_status(JobStatus::Pending)
        });
        state.merge(JobProgress {
            progress_percent: Some(30.0),
            ..JobProgress::with_status(JobStatus::Running)
        });
        assert_eq!(state.job_id.as_deref(), Some("j1"));
        assert_eq!(state.file_count, Some(2));
        assert_eq!(state.status, JobStatus::Running);
        assert!((state.progress_percent - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_socket_frames() {
        let e = JobEvent::parse(r#"{"type":"connected","data":{"status":"running"}}"#).unwrap();
        assert_eq!(e.kind(), "connected");

        let e = JobEvent::parse(r#"{"type":"connected"}"#).unwrap();
        assert_eq!(e, JobEvent::Connected(JobProgress::default()));

        let e = JobEvent::parse(r#"{"type":"error","data":{"error":"disk full"}}"#).unwrap();
        assert_eq!(
            e,
            JobEvent::Error {
                error: Some("disk full".into())
            }
        );

        let e = JobEvent::parse(r#"{"type":"heartbeat","data":{}}"#).unwrap();
        assert_eq!(e, JobEvent::Unknown("heartbeat".into()));
        assert!(e.into_patch().is_none());

        assert!(JobEvent::parse("not json").is_err());
    }

    #[test]
    fn completed_forces_status_and_percent() {
        let e = JobEvent::parse(
            r#"{"type":"completed","data":{"status":"running","progress_percent":80,"relationships_found":4}}"#,
        )
        .unwrap();
        let patch = e.into_patch().unwrap();
        assert_eq!(patch.status, Some(JobStatus::Completed));
        assert_eq!(patch.progress_percent, Some(100.0));
        assert_eq!(patch.relationships_found, Some(4));
    }

    #[test]
    fn error_event_marks_failed() {
        let patch = JobEvent::Error {
            error: Some("boom".into()),
        }
        .into_patch()
        .unwrap();
        assert_eq!(patch.status, Some(JobStatus::Failed));
        assert_eq!(patch.error.as_deref(), Some("boom"));
    }

    #[test]
    fn recommended_deletions_use_original_index() {
        let group: DuplicateGroup = serde_json::from_value(json!({
            "columns": ["id", "id_copy", "id_copy2"],
            "detection_type": "suffix_pattern",
            "similarity_score": 98.0,
            "recommendation": "Keep 'id'",
            "metadata": {"content_identical": [false, true, false]}
        }))
        .unwrap();
        let deletions: Vec<&str> = group.recommended_deletions().collect();
        assert_eq!(deletions, vec!["id_copy"]);
        assert_eq!(group.detection_type, DetectionType::SuffixPattern);
        assert_eq!(group.detection_type.label(), "Suffix Pattern");
    }

    #[test]
    fn first_column_is_never_recommended() {
        let group = DuplicateGroup {
            columns: vec!["a".into(), "b".into()],
            metadata: Some(DuplicateMetadata {
                content_identical: vec![json!(true), json!(1)],
                ..DuplicateMetadata::default()
            }),
            ..DuplicateGroup::default()
        };
        assert_eq!(group.recommended_deletions().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn missing_metadata_recommends_nothing() {
        let group = DuplicateGroup {
            columns: vec!["a".into(), "b".into()],
            ..DuplicateGroup::default()
        };
        assert_eq!(group.recommended_deletions().count(), 0);
    }

    #[test]
    fn preview_columns_accept_name_field() {
        let file: FilePreview = serde_json::from_value(json!({
            "file_id": "file_0123456789ab_sales.xlsx",
            "row_count": 10,
            "column_count": 1,
            "columns": [{"name": "amount", "data_type": "float", "null_count": 0, "unique_count": 9}]
        }))
        .unwrap();
        assert_eq!(file.columns[0].name, "amount");
        assert_eq!(file.display_name(), "sales.xlsx");
    }
}
