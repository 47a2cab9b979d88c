//! Shape checks for result documents.
//!
//! The checker compares a raw `GET /jobs/{id}/result` document against the
//! fields this client renders and reports every mismatch as a warning.
//! Nothing here is fatal: the transform tolerates all of these gaps.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::types::truthy;

/// Counts reported alongside the warnings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResponseSummary {
    pub total_files: usize,
    pub total_relationships: usize,
    pub warning_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseReport {
    pub warnings: Vec<String>,
    pub summary: ResponseSummary,
}

impl ResponseReport {
    pub fn is_valid(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Emit the summary at `info` and each warning at `warn`.
    pub fn log(&self) {
        let s = &self.summary;
        if self.is_valid() {
            info!(
                files = s.total_files,
                relationships = s.total_relationships,
                "Result document passed shape checks"
            );
            return;
        }
        warn!(
            files = s.total_files,
            relationships = s.total_relationships,
            warnings = s.warning_count,
            "Result document has shape issues"
        );
        for (i, w) in self.warnings.iter().enumerate() {
            warn!("{}. {w}", i + 1);
        }
    }
}

fn is_truthy(v: Option<&Value>) -> bool {
    v.is_some_and(truthy)
}

/// Render a value for a message; absent fields read as `undefined`.
fn show(v: Option<&Value>) -> String {
    v.map_or_else(|| "undefined".to_string(), Value::to_string)
}

fn same_number(a: &Value, b: Option<&Value>) -> bool {
    match (a.as_f64(), b.and_then(Value::as_f64)) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => Some(a) == b,
    }
}

fn check_column(column: &Value, file_idx: usize, col_idx: usize, out: &mut Vec<String>) {
    let at = format!("File[{file_idx}].columns[{col_idx}]");

    if !is_truthy(column.get("column_name")) && !is_truthy(column.get("name")) {
        out.push(format!("{at}: Missing both 'column_name' and 'name' fields"));
    }
    if !is_truthy(column.get("data_type")) {
        out.push(format!("{at}: Missing 'data_type' field"));
    }
    if column.get("is_primary_key").is_none()
        && !is_truthy(column.pointer("/key_features/primary_key_candidate"))
    {
        out.push(format!(
            "{at}: Missing 'is_primary_key' field (optional but recommended)"
        ));
    }
    if column.get("is_foreign_key").is_none()
        && !is_truthy(column.pointer("/key_features/foreign_key_candidate"))
    {
        out.push(format!(
            "{at}: Missing 'is_foreign_key' field (optional but recommended)"
        ));
    }
}

fn check_file(file: &Value, idx: usize, out: &mut Vec<String>) {
    if !is_truthy(file.get("file_name")) {
        out.push(format!("File[{idx}]: Missing 'file_name' field"));
    }
    if file.get("row_count").is_none() {
        out.push(format!("File[{idx}]: Missing 'row_count' field"));
    }
    if file.get("column_count").is_none() {
        out.push(format!("File[{idx}]: Missing 'column_count' field"));
    }

    let Some(columns) = file.get("columns").and_then(Value::as_array) else {
        out.push(format!("File[{idx}]: Missing or invalid 'columns' array"));
        return;
    };

    let file_rows = file.get("row_count");
    for (col_idx, column) in columns.iter().enumerate() {
        check_column(column, idx, col_idx, out);
        if let Some(rows) = column.get("row_count") {
            if !same_number(rows, file_rows) {
                out.push(format!(
                    "File[{idx}].columns[{col_idx}]: Inconsistent row_count (column: {rows}, file: {})",
                    show(file_rows)
                ));
            }
        }
    }

    let declared = file.get("column_count");
    if declared.and_then(Value::as_u64) != Some(columns.len() as u64) {
        out.push(format!(
            "File[{idx}]: Column count mismatch (columns array: {}, column_count: {})",
            columns.len(),
            show(declared)
        ));
    }
}

fn check_insights(insights: Option<&Value>, rel: &str, out: &mut Vec<String>) {
    let Some(insights) = insights.filter(|v| truthy(v)) else {
        out.push(format!("Relationship[{rel}]: Missing 'business_insights'"));
        return;
    };

    match insights.get("relationship_validity").filter(|v| truthy(v)) {
        None => out.push(format!(
            "Relationship[{rel}]: Missing 'business_insights.relationship_validity'"
        )),
        Some(validity) if validity.get("is_valid").is_none() => out.push(format!(
            "Relationship[{rel}]: Missing 'business_insights.relationship_validity.is_valid'"
        )),
        Some(_) => {}
    }

    match insights.get("decision_making_value") {
        None | Some(Value::Null) => out.push(format!(
            "Relationship[{rel}]: Missing 'business_insights.decision_making_value'"
        )),
        Some(Value::Bool(_)) => out.push(format!(
            "Relationship[{rel}]: 'decision_making_value' should be an object with 'can_decision_makers_act' and 'specific_actions_enabled', not a boolean"
        )),
        Some(value @ Value::Object(_)) => {
            if value.get("can_decision_makers_act").is_none() {
                out.push(format!(
                    "Relationship[{rel}]: Missing 'business_insights.decision_making_value.can_decision_makers_act'"
                ));
            }
            if !is_truthy(value.get("specific_actions_enabled")) {
                out.push(format!(
                    "Relationship[{rel}]: Missing 'business_insights.decision_making_value.specific_actions_enabled'"
                ));
            }
        }
        Some(_) => {}
    }

    if !is_truthy(insights.get("what_story_it_tells")) {
        out.push(format!(
            "Relationship[{rel}]: Missing 'business_insights.what_story_it_tells' (recommended)"
        ));
    }
    if !insights
        .get("critical_insights_revealed")
        .is_some_and(Value::is_array)
    {
        out.push(format!(
            "Relationship[{rel}]: Missing or invalid 'business_insights.critical_insights_revealed' array"
        ));
    }
    if !insights.get("answerable_questions").is_some_and(Value::is_array) {
        out.push(format!(
            "Relationship[{rel}]: Missing or invalid 'business_insights.answerable_questions' array"
        ));
    }
}

fn endpoint_complete(endpoint: Option<&Value>) -> bool {
    endpoint.is_some_and(|e| is_truthy(e.get("file")) && is_truthy(e.get("column")))
}

fn check_relationship(rel: &Value, idx: usize, files: &[Value], out: &mut Vec<String>) {
    let rel_id = match rel.get("relationship_id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(v) if truthy(v) => v.to_string(),
        _ => {
            out.push(format!("Relationship[{idx}]: Missing 'relationship_id'"));
            format!("index_{idx}")
        }
    };

    if !endpoint_complete(rel.get("source")) {
        out.push(format!(
            "Relationship[{rel_id}]: Missing or invalid 'source' (file/column)"
        ));
    }
    if !endpoint_complete(rel.get("target")) {
        out.push(format!(
            "Relationship[{rel_id}]: Missing or invalid 'target' (file/column)"
        ));
    }

    for (side, label) in [("/source/file", "Source"), ("/target/file", "Target")] {
        let Some(file) = rel.pointer(side).filter(|v| truthy(v)) else {
            continue;
        };
        if !files.iter().any(|f| f.get("file_name") == Some(file)) {
            let name = file.as_str().map_or_else(|| file.to_string(), str::to_string);
            out.push(format!(
                "Relationship[{rel_id}]: {label} file \"{name}\" not found in files array"
            ));
        }
    }

    match rel.get("statistics").filter(|v| truthy(v)) {
        None => out.push(format!("Relationship[{rel_id}]: Missing 'statistics'")),
        Some(stats) => {
            if stats.get("data_quality_warnings").is_none()
                && rel.get("data_quality_concerns").is_some()
            {
                out.push(format!(
                    "Relationship[{rel_id}]: 'data_quality_concerns' should be in 'statistics.data_quality_warnings', not at root level"
                ));
            }
        }
    }

    check_insights(rel.get("business_insights"), &rel_id, out);
}

/// Check a result document, either the `{job_id, status, result}` envelope
/// or a bare `{files, relationships}` result.
pub fn check_response(response: &Value) -> ResponseReport {
    if response.is_null() {
        return ResponseReport {
            warnings: vec!["API response is null or undefined".to_string()],
            summary: ResponseSummary {
                warning_count: 1,
                ..ResponseSummary::default()
            },
        };
    }

    let result = response
        .get("result")
        .filter(|v| truthy(v))
        .unwrap_or(response);

    let mut warnings = Vec::new();
    let files = result.get("files").and_then(Value::as_array);
    let relationships = result.get("relationships").and_then(Value::as_array);

    match files {
        Some(files) => {
            for (i, file) in files.iter().enumerate() {
                check_file(file, i, &mut warnings);
            }
        }
        None => warnings.push("Missing or invalid files array".to_string()),
    }

    match relationships {
        Some(rels) => {
            let files = files.map(Vec::as_slice).unwrap_or_default();
            for (i, rel) in rels.iter().enumerate() {
                check_relationship(rel, i, files, &mut warnings);
            }
        }
        None => warnings.push("Missing or invalid relationships array".to_string()),
    }

    let summary = ResponseSummary {
        total_files: files.map_or(0, Vec::len),
        total_relationships: relationships.map_or(0, Vec::len),
        warning_count: warnings.len(),
    };
    ResponseReport { warnings, summary }
}
