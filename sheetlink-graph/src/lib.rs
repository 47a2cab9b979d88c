//! Relationship graph model for sheetlink.
//!
//! Turns a completed analysis result into a file/column node graph
//! ([`transform::transform`]), aggregates edges by confidence
//! ([`confidence::count_by_confidence`]) and tracks per-level visibility
//! ([`confidence::ConfidenceFilter`]). Nothing in this crate performs I/O.

pub mod confidence;
pub mod model;
pub mod transform;

pub use confidence::{ConfidenceCounts, ConfidenceFilter, LevelFilter, count_by_confidence};
pub use model::{
    AnalysisResult, ColumnProfile, ConfidenceLevel, Endpoint, FileProfile, JobResultEnvelope,
    Relationship, RelationshipStatistics,
};
pub use transform::{
    DropReason, DroppedRelationship, EdgeStyle, GraphEdge, GraphModel, GraphNode, NodeData,
    NodeId, transform,
};

/// Error type for decoding analysis payloads.
#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("Invalid result payload: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Decode a `GET /jobs/{id}/result` body.
pub fn parse_envelope(json: &str) -> Result<JobResultEnvelope> {
    Ok(serde_json::from_str(json)?)
}

/// Decode a JSON document that is either a result envelope or a bare
/// analysis result (`{files, relationships}`).
pub fn parse_result_document(json: &str) -> Result<JobResultEnvelope> {
    result_document_from_value(serde_json::from_str(json)?)
}

/// [`parse_result_document`] for an already-parsed value.
pub fn result_document_from_value(value: serde_json::Value) -> Result<JobResultEnvelope> {
    if value.get("result").is_some() {
        return Ok(serde_json::from_value(value)?);
    }
    Ok(JobResultEnvelope {
        result: Some(serde_json::from_value(value)?),
        ..JobResultEnvelope::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_and_wrapped_documents() {
        let bare = r#"{"files": [{"file_name": "a.csv"}], "relationships": []}"#;
        let env = parse_result_document(bare).unwrap();
        assert!(env.job_id.is_none());
        assert_eq!(env.result.unwrap().files.len(), 1);

        let wrapped = r#"{"job_id": "j", "status": "completed", "result": {"files": []}}"#;
        let env = parse_result_document(wrapped).unwrap();
        assert_eq!(env.job_id.as_deref(), Some("j"));
        assert!(env.is_completed());
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(parse_envelope("not json").is_err());
    }
}
