//! JSON report export: the full job result, or only the relationships that
//! pass the current confidence filter.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::info;

use sheetlink_graph::{ConfidenceFilter, ConfidenceLevel};

use crate::error::ExportError;
use crate::types::{JobState, truthy};

/// `{job_id, status, completed_at, result}` for the current job.
pub fn full_report(job: &JobState) -> Value {
    json!({
        "job_id": job.job_id,
        "status": job.status,
        "completed_at": job.completed_at,
        "result": job.result,
    })
}

/// Copy of `full` keeping only relationships whose id is in `visible_ids`,
/// with `report_metadata` updated to describe the filter. `None` when the
/// report carries no result.
pub fn filter_by_visibility(
    full: &Value,
    visible_ids: &[String],
    filter: &ConfidenceFilter,
) -> Option<Value> {
    let result = full.get("result").filter(|r| truthy(r))?;
    let visible: HashSet<&str> = visible_ids.iter().map(String::as_str).collect();

    let relationships: Vec<Value> = result
        .get("relationships")
        .and_then(Value::as_array)
        .map(|rels| {
            rels.iter()
                .filter(|r| {
                    r.get("relationship_id")
                        .and_then(Value::as_str)
                        .is_some_and(|id| visible.contains(id))
                })
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let levels: Vec<&str> = filter
        .visible_levels()
        .into_iter()
        .map(ConfidenceLevel::as_str)
        .collect();

    let mut metadata = result
        .get("report_metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    metadata.insert("total_relationships_found".into(), relationships.len().into());
    metadata.insert("filtered".into(), true.into());
    metadata.insert(
        "filters_applied".into(),
        json!({ "confidence_levels": levels }),
    );

    let mut filtered_result = result.as_object().cloned().unwrap_or_default();
    filtered_result.insert("relationships".into(), Value::Array(relationships));
    filtered_result.insert("report_metadata".into(), Value::Object(metadata));

    let mut out = full.as_object().cloned().unwrap_or_default();
    out.insert("result".into(), Value::Object(filtered_result));
    Some(Value::Object(out))
}

/// `{prefix}_{YYYY-MM-DDTHH-MM-SS}.{ext}` in UTC.
pub fn generate_filename(prefix: &str, ext: &str, now: DateTime<Utc>) -> String {
    format!("{prefix}_{}.{ext}", now.format("%Y-%m-%dT%H-%M-%S"))
}

/// Write `value` as pretty-printed JSON, creating `dir` if needed.
pub fn write_json(dir: &Path, filename: &str, value: &Value) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    let body = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, body)?;
    info!(path = %path.display(), "Report exported");
    Ok(path)
}

fn prefix(kind: &str, job: &JobState) -> String {
    format!("{kind}_{}", job.job_id.as_deref().unwrap_or("export"))
}

/// Export the full report as `analysis_report_{job}_{timestamp}.json`.
pub fn export_full(dir: &Path, job: &JobState, now: DateTime<Utc>) -> Result<PathBuf, ExportError> {
    let filename = generate_filename(&prefix("analysis_report", job), "json", now);
    write_json(dir, &filename, &full_report(job))
}

/// Export the visible relationships as `filtered_report_{job}_{timestamp}.json`.
pub fn export_filtered(
    dir: &Path,
    job: &JobState,
    visible_ids: &[String],
    filter: &ConfidenceFilter,
    now: DateTime<Utc>,
) -> Result<PathBuf, ExportError> {
    let filtered = filter_by_visibility(&full_report(job), visible_ids, filter)
        .ok_or(ExportError::NothingToExport)?;
    let filename = generate_filename(&prefix("filtered_report", job), "json", now);
    write_json(dir, &filename, &filtered)
}
