// Analysis result model: files, columns, and discovered relationships.
//
// Ingest is lenient. The backend has shipped several shapes over time
// (`column_name` vs `name`, `is_primary_key` vs `key_features`), so every
// wire struct is normalized into one canonical form as it is deserialized.
// A field of the wrong type reads as absent, and an array entry that is not
// an object keeps its slot: node and edge ids are positional.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

// ── Confidence level ───────────────────────────────────────────────

/// Discrete confidence bucket assigned to a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// All levels in display order.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    /// Parse an exact wire value (`HIGH`, `MEDIUM`, `LOW`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }

    /// Resolve a declared level to a bucket. Missing and unrecognized
    /// values land in `Medium`.
    pub fn resolve(declared: Option<&str>) -> Self {
        declared.and_then(Self::parse).unwrap_or(Self::Medium)
    }

    /// Position in [`ConfidenceLevel::ALL`].
    pub fn index(self) -> usize {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConfidenceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(&s.to_ascii_uppercase())
            .ok_or_else(|| format!("unknown confidence level: {s} (use HIGH, MEDIUM, LOW)"))
    }
}

// ── Columns ────────────────────────────────────────────────────────

/// A profiled column, normalized from any of the backend's wire shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawColumn")]
pub struct ColumnProfile {
    /// Canonical column identity used for display and relationship matching.
    #[serde(rename = "column_name")]
    pub name: String,
    pub data_type: String,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub null_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_count: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<serde_json::Value>,
}

impl Default for ColumnProfile {
    fn default() -> Self {
        Self::from(RawColumn::default())
    }
}

impl ColumnProfile {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_primary_key: false,
            is_foreign_key: false,
            null_count: None,
            unique_count: None,
            sample_values: Vec::new(),
        }
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    #[must_use]
    pub fn foreign_key(mut self) -> Self {
        self.is_foreign_key = true;
        self
    }
}

#[derive(Deserialize, Default)]
struct RawColumn {
    #[serde(default, deserialize_with = "lenient_text")]
    column_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    data_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    is_primary_key: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    is_foreign_key: Option<bool>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    key_features: KeyFeatures,
    #[serde(default, deserialize_with = "lenient_count")]
    null_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    unique_count: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    sample_values: Option<Vec<Value>>,
}

#[derive(Deserialize, Default)]
struct KeyFeatures {
    #[serde(default, deserialize_with = "lenient")]
    primary_key_candidate: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    foreign_key_candidate: Option<bool>,
}

impl From<RawColumn> for ColumnProfile {
    fn from(raw: RawColumn) -> Self {
        let name = raw
            .column_name
            .filter(|n| !n.is_empty())
            .or(raw.name)
            .unwrap_or_default();
        let keys = raw.key_features;

        Self {
            name,
            data_type: raw
                .data_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            is_primary_key: raw
                .is_primary_key
                .or(keys.primary_key_candidate)
                .unwrap_or(false),
            is_foreign_key: raw
                .is_foreign_key
                .or(keys.foreign_key_candidate)
                .unwrap_or(false),
            null_count: raw.null_count,
            unique_count: raw.unique_count,
            sample_values: raw.sample_values.unwrap_or_default(),
        }
    }
}

// ── Files ──────────────────────────────────────────────────────────

/// One analyzed file (or sheet) with its column profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileProfile {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub file_name: String,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub sheet_name: Option<String>,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub row_count: u64,
    #[serde(default, deserialize_with = "count_or_zero")]
    pub column_count: u64,
    #[serde(default, deserialize_with = "positional_vec")]
    pub columns: Vec<ColumnProfile>,
}

impl FileProfile {
    pub fn new(file_name: impl Into<String>, columns: Vec<ColumnProfile>) -> Self {
        Self {
            file_name: file_name.into(),
            sheet_name: None,
            row_count: 0,
            column_count: columns.len() as u64,
            columns,
        }
    }

    /// Position of the first column whose canonical name equals `name`.
    /// Unnamed columns never match.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.columns.iter().position(|c| c.name == name)
    }
}

// ── Relationships ──────────────────────────────────────────────────

/// One side of a relationship: a column in a named file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub file: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub column: Option<String>,
}

impl Endpoint {
    pub fn new(file: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            column: Some(column.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipStatistics {
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub value_overlap_percent: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub orphans_in_source: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_strings",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub data_quality_warnings: Vec<String>,
}

/// A detected correspondence between two columns in different files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub relationship_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub source: Endpoint,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub target: Endpoint,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub relationship_type: Option<String>,
    /// Level exactly as the backend declared it, if at all.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence_level: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub statistics: RelationshipStatistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_insights: Option<Value>,
    /// Set when the array entry could not be read as a relationship at all.
    #[serde(skip)]
    pub malformed: Option<String>,
}

impl Relationship {
    pub fn new(id: impl Into<String>, source: Endpoint, target: Endpoint) -> Self {
        Self {
            relationship_id: Some(id.into()),
            source,
            target,
            ..Self::default()
        }
    }

    /// Placeholder for an entry that is not a relationship object.
    pub fn malformed(error: impl Into<String>) -> Self {
        Self {
            malformed: Some(error.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.confidence_level = Some(level.to_string());
        self
    }

    /// Bucket this relationship falls into.
    pub fn confidence(&self) -> ConfidenceLevel {
        ConfidenceLevel::resolve(self.confidence_level.as_deref())
    }
}

// ── Result containers ──────────────────────────────────────────────

/// The payload of a completed job: profiled files and their relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "positional_vec")]
    pub files: Vec<FileProfile>,
    #[serde(
        default,
        deserialize_with = "relationship_vec",
        serialize_with = "decoded_only"
    )]
    pub relationships: Vec<Relationship>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_metadata: Option<Value>,
}

impl AnalysisResult {
    pub fn new(files: Vec<FileProfile>, relationships: Vec<Relationship>) -> Self {
        Self {
            files,
            relationships,
            report_metadata: None,
        }
    }

    /// First file whose `file_name` equals `name` exactly. Unnamed files
    /// never match.
    pub fn file_position(&self, name: &str) -> Option<usize> {
        if name.is_empty() {
            return None;
        }
        self.files.iter().position(|f| f.file_name == name)
    }
}

/// Response body of `GET /jobs/{id}/result`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResultEnvelope {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub result: Option<AnalysisResult>,
}

impl JobResultEnvelope {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

// ── Lenient field readers ──────────────────────────────────────────

/// Any value that does not fit `T` (including `null`) reads as `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

/// Strings as-is, numbers in their JSON spelling, anything else `None`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_f64())
}

/// Non-negative counts, whether the backend wrote `3` or `3.0`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f.round() as u64)
    }))
}

fn count_or_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_count(deserializer)?.unwrap_or(0))
}

/// The string entries of an array; non-strings and non-arrays are ignored.
fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect())
}

// ── Positional arrays ──────────────────────────────────────────────

/// Decode every array entry, substituting `placeholder` for entries that do
/// not fit. A non-array value yields an empty vector.
fn decode_each<'de, D, T>(
    deserializer: D,
    placeholder: impl Fn(serde_json::Error) -> T,
) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item).unwrap_or_else(|e| {
                warn!(index, error = %e, "Malformed entry kept as a placeholder");
                placeholder(e)
            })
        })
        .collect())
}

fn positional_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    decode_each(deserializer, |_| T::default())
}

fn relationship_vec<'de, D>(deserializer: D) -> Result<Vec<Relationship>, D::Error>
where
    D: Deserializer<'de>,
{
    decode_each(deserializer, |e| Relationship::malformed(e.to_string()))
}

/// Placeholders are not written back out.
fn decoded_only<S>(relationships: &[Relationship], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(relationships.iter().filter(|r| r.malformed.is_none()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn column_name_takes_precedence_over_legacy_name() {
        let col: ColumnProfile =
            serde_json::from_value(json!({"column_name": "A", "name": "B"})).unwrap();
        assert_eq!(col.name, "A");
    }

    #[test]
    fn legacy_name_used_when_column_name_missing_or_empty() {
        let col: ColumnProfile = serde_json::from_value(json!({"name": "B"})).unwrap();
        assert_eq!(col.name, "B");

        let col: ColumnProfile =
            serde_json::from_value(json!({"column_name": "", "name": "B"})).unwrap();
        assert_eq!(col.name, "B");
    }

    #[test]
    fn data_type_defaults_to_unknown() {
        let col: ColumnProfile = serde_json::from_value(json!({"name": "x"})).unwrap();
        assert_eq!(col.data_type, "unknown");
        assert!(!col.is_primary_key);
        assert!(!col.is_foreign_key);
    }

    #[test]
    fn key_features_fill_missing_key_flags() {
        let col: ColumnProfile = serde_json::from_value(json!({
            "column_name": "id",
            "key_features": {"primary_key_candidate": true, "foreign_key_candidate": true}
        }))
        .unwrap();
        assert!(col.is_primary_key);
        assert!(col.is_foreign_key);

        // Explicit flags win over key_features.
        let col: ColumnProfile = serde_json::from_value(json!({
            "column_name": "id",
            "is_primary_key": false,
            "key_features": {"primary_key_candidate": true}
        }))
        .unwrap();
        assert!(!col.is_primary_key);
    }

    #[test]
    fn canonical_column_serializes_as_column_name() {
        let col = ColumnProfile::new("id", "integer").primary_key();
        let v = serde_json::to_value(&col).unwrap();
        assert_eq!(v["column_name"], "id");
        assert!(v.get("name").is_none());
    }

    #[test]
    fn malformed_relationships_keep_their_slot() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "files": [{"file_name": "a.xlsx", "columns": []}],
            "relationships": [
                {"relationship_id": "r1", "source": {"file": "a.xlsx", "column": "id"}},
                "not an object",
                {"relationship_id": 42},
                null,
            ]
        }))
        .unwrap();
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.relationships.len(), 4);
        assert_eq!(result.relationships[0].relationship_id.as_deref(), Some("r1"));
        assert!(result.relationships[1].malformed.is_some());
        assert_eq!(result.relationships[2].relationship_id.as_deref(), Some("42"));
        assert!(result.relationships[2].malformed.is_none());
        assert!(result.relationships[3].malformed.is_some());

        // Placeholders are not written back out.
        let written = serde_json::to_value(&result).unwrap();
        assert_eq!(written["relationships"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn float_and_null_statistics_keep_the_relationship() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "relationships": [
                {"relationship_id": "r0",
                 "confidence_score": 88,
                 "statistics": {"orphans_in_source": 3.0, "data_quality_warnings": null}},
                {"relationship_id": "r1",
                 "statistics": {"value_overlap_percent": "n/a",
                                "data_quality_warnings": ["mixed types", 7]}},
            ]
        }))
        .unwrap();
        assert_eq!(result.relationships.len(), 2);

        let r0 = &result.relationships[0];
        assert_eq!(r0.statistics.orphans_in_source, Some(3));
        assert!(r0.statistics.data_quality_warnings.is_empty());
        assert_eq!(r0.confidence_score, Some(88.0));

        let r1 = &result.relationships[1];
        assert_eq!(r1.statistics.value_overlap_percent, None);
        assert_eq!(r1.statistics.data_quality_warnings, vec!["mixed types"]);
    }

    #[test]
    fn float_counts_keep_columns_and_files_in_place() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "files": [
                {"file_name": "a.xlsx", "row_count": 1.0e3, "column_count": 2.0,
                 "columns": [
                    {"column_name": "x", "null_count": 0.0, "unique_count": -1},
                    {"column_name": "id"},
                 ]},
                "garbage",
                {"file_name": "b.xlsx", "sheet_name": null, "columns": [7, {"name": "y"}]},
            ]
        }))
        .unwrap();
        assert_eq!(result.files.len(), 3);

        let a = &result.files[0];
        assert_eq!(a.row_count, 1000);
        assert_eq!(a.column_count, 2);
        assert_eq!(a.columns[0].name, "x");
        assert_eq!(a.columns[0].null_count, Some(0));
        assert_eq!(a.columns[0].unique_count, None);
        assert_eq!(a.column_position("id"), Some(1));

        assert_eq!(result.files[1], FileProfile::default());
        assert_eq!(result.file_position("b.xlsx"), Some(2));
        assert_eq!(result.files[2].columns[0], ColumnProfile::default());
        assert_eq!(result.files[2].column_position("y"), Some(1));
    }

    #[test]
    fn unnamed_files_and_columns_never_match() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "files": [{"columns": [{"data_type": "string"}]}]
        }))
        .unwrap();
        assert_eq!(result.files[0].file_name, "");
        assert_eq!(result.file_position(""), None);
        assert_eq!(result.files[0].columns[0].name, "");
        assert_eq!(result.files[0].column_position(""), None);
    }

    #[test]
    fn null_endpoints_keep_the_relationship() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "relationships": [{"relationship_id": "r1", "source": null, "statistics": null}]
        }))
        .unwrap();
        assert_eq!(result.relationships.len(), 1);
        assert_eq!(result.relationships[0].source, Endpoint::default());
    }

    #[test]
    fn missing_arrays_are_empty() {
        let result: AnalysisResult = serde_json::from_value(json!({})).unwrap();
        assert!(result.files.is_empty());
        assert!(result.relationships.is_empty());

        let result: AnalysisResult =
            serde_json::from_value(json!({"files": null, "relationships": {}})).unwrap();
        assert!(result.files.is_empty());
        assert!(result.relationships.is_empty());
    }

    #[test]
    fn confidence_resolution_defaults_to_medium() {
        assert_eq!(ConfidenceLevel::resolve(Some("HIGH")), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::resolve(Some("LOW")), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::resolve(None), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::resolve(Some("VERY_HIGH")), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::resolve(Some("high")), ConfidenceLevel::Medium);
    }

    #[test]
    fn confidence_from_str_is_case_insensitive() {
        assert_eq!("low".parse::<ConfidenceLevel>().unwrap(), ConfidenceLevel::Low);
        assert!("bogus".parse::<ConfidenceLevel>().is_err());
    }

    #[test]
    fn envelope_completion() {
        let env: JobResultEnvelope = serde_json::from_value(json!({
            "job_id": "j1",
            "status": "completed",
            "result": {"files": [], "relationships": []}
        }))
        .unwrap();
        assert!(env.is_completed());
        assert!(env.result.is_some());

        let env: JobResultEnvelope =
            serde_json::from_value(json!({"job_id": "j1", "status": "running"})).unwrap();
        assert!(!env.is_completed());
        assert!(env.result.is_none());
    }

    #[test]
    fn file_lookup_is_first_match() {
        let result = AnalysisResult::new(
            vec![
                FileProfile::new("dup.xlsx", vec![ColumnProfile::new("a", "string")]),
                FileProfile::new("dup.xlsx", vec![ColumnProfile::new("b", "string")]),
            ],
            vec![],
        );
        assert_eq!(result.file_position("dup.xlsx"), Some(0));
        assert_eq!(result.file_position("missing.xlsx"), None);
    }
}
