// Analysis result → renderable graph model.
//
// Files become parent nodes, their columns become child nodes, and every
// relationship whose endpoints resolve by exact name becomes an edge.
// Relationships that do not resolve are recorded in `GraphModel::dropped`
// instead of failing the transform.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::{AnalysisResult, ColumnProfile, ConfidenceLevel, FileProfile, Relationship};

const FILE_NODE_SPACING: f64 = 400.0;
const FILE_NODE_WIDTH: u32 = 320;
const COLUMN_NODE_WIDTH: u32 = 280;
const COLUMN_NODE_X: f64 = 10.0;
const COLUMN_NODE_TOP: f64 = 70.0;
const COLUMN_NODE_SPACING: f64 = 45.0;

// ── Nodes ──────────────────────────────────────────────────────────

/// Node identity, positional within one transform invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn file(file_index: usize) -> Self {
        Self(format!("file-{file_index}"))
    }

    pub fn column(file_index: usize, col_index: usize) -> Self {
        Self(format!("file-{file_index}-col-{col_index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStyle {
    pub width: u32,
    pub background: &'static str,
    pub border: &'static str,
}

/// File-level summary carried by a parent node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNodeData {
    pub sheet_name: Option<String>,
    pub row_count: u64,
    pub column_count: u64,
}

/// Column attributes carried by a child node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnNodeData {
    pub data_type: String,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
    pub file_index: usize,
    pub col_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeData {
    File(FileNodeData),
    Column(ColumnNodeData),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    /// Containing file node, for column nodes.
    pub parent: Option<NodeId>,
    /// Position relative to the parent (absolute for file nodes).
    pub position: Position,
    pub style: NodeStyle,
    pub data: NodeData,
}

impl GraphNode {
    pub fn is_file(&self) -> bool {
        matches!(self.data, NodeData::File(_))
    }

    fn for_file(file_index: usize, file: &FileProfile) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let x = file_index as f64 * FILE_NODE_SPACING;
        Self {
            id: NodeId::file(file_index),
            label: file.file_name.clone(),
            parent: None,
            position: Position { x, y: 0.0 },
            style: NodeStyle {
                width: FILE_NODE_WIDTH,
                background: "#f0f4f8",
                border: "#3b82f6",
            },
            data: NodeData::File(FileNodeData {
                sheet_name: file.sheet_name.clone(),
                row_count: file.row_count,
                column_count: file.column_count,
            }),
        }
    }

    fn for_column(file_index: usize, col_index: usize, column: &ColumnProfile) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let y = COLUMN_NODE_TOP + col_index as f64 * COLUMN_NODE_SPACING;
        Self {
            id: NodeId::column(file_index, col_index),
            label: column.name.clone(),
            parent: Some(NodeId::file(file_index)),
            position: Position { x: COLUMN_NODE_X, y },
            style: NodeStyle {
                width: COLUMN_NODE_WIDTH,
                background: if column.is_primary_key {
                    "#fef3c7"
                } else {
                    "#e0e7ff"
                },
                border: "#94a3b8",
            },
            data: NodeData::Column(ColumnNodeData {
                data_type: column.data_type.clone(),
                is_primary_key: column.is_primary_key,
                is_foreign_key: column.is_foreign_key,
                file_index,
                col_index,
            }),
        }
    }
}

// ── Edges ──────────────────────────────────────────────────────────

/// Visual descriptor for an edge, derived only from its declared level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeStyle {
    pub stroke: &'static str,
    pub stroke_width: u8,
    pub dash_array: Option<&'static str>,
    pub animated: bool,
}

impl EdgeStyle {
    /// Three-way switch on the declared level; anything else (including a
    /// missing level) gets the neutral fallback.
    pub fn for_declared(declared: Option<&str>) -> Self {
        match declared {
            Some("HIGH") => Self {
                stroke: "#10b981",
                stroke_width: 3,
                dash_array: None,
                animated: true,
            },
            Some("MEDIUM") => Self {
                stroke: "#f59e0b",
                stroke_width: 2,
                dash_array: Some("5,5"),
                animated: false,
            },
            Some("LOW") => Self {
                stroke: "#9ca3af",
                stroke_width: 1,
                dash_array: Some("2,2"),
                animated: false,
            },
            _ => Self {
                stroke: "#6b7280",
                stroke_width: 1,
                dash_array: None,
                animated: false,
            },
        }
    }

    /// Arrow marker colour; always matches the stroke.
    pub fn marker_color(&self) -> &'static str {
        self.stroke
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    /// `edge-{k}` where `k` is the relationship's index in the result.
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    pub label: String,
    pub confidence_level: ConfidenceLevel,
    pub style: EdgeStyle,
    /// The relationship this edge was built from.
    pub relationship: Relationship,
}

// ── Drops ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The entry was not a relationship object.
    Malformed,
    SourceFileNotFound,
    TargetFileNotFound,
    SourceColumnNotFound,
    TargetColumnNotFound,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Malformed => "malformed entry",
            Self::SourceFileNotFound => "source file not found",
            Self::TargetFileNotFound => "target file not found",
            Self::SourceColumnNotFound => "source column not found",
            Self::TargetColumnNotFound => "target column not found",
        })
    }
}

/// A relationship that could not be placed on the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRelationship {
    pub index: usize,
    pub relationship_id: Option<String>,
    pub reason: DropReason,
}

// ── Graph model ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphModel {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub dropped: Vec<DroppedRelationship>,
}

impl GraphModel {
    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn file_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.is_file())
    }

    pub fn column_nodes_of(&self, file: &NodeId) -> Vec<&GraphNode> {
        self.nodes
            .iter()
            .filter(|n| n.parent.as_ref() == Some(file))
            .collect()
    }
}

/// Build the graph model for an analysis result.
///
/// Pure and deterministic: the same input always yields the same node and
/// edge ids in the same order. Edges follow relationship order with
/// unresolvable relationships removed.
pub fn transform(result: &AnalysisResult) -> GraphModel {
    let mut model = GraphModel::default();

    for (file_index, file) in result.files.iter().enumerate() {
        model.nodes.push(GraphNode::for_file(file_index, file));
        for (col_index, column) in file.columns.iter().enumerate() {
            model
                .nodes
                .push(GraphNode::for_column(file_index, col_index, column));
        }
    }

    for (index, rel) in result.relationships.iter().enumerate() {
        match resolve(result, rel) {
            Ok((source, target)) => model.edges.push(build_edge(index, rel, source, target)),
            Err(reason) => {
                warn!(
                    index,
                    relationship_id = rel.relationship_id.as_deref().unwrap_or("-"),
                    source_file = rel.source.file.as_deref().unwrap_or("-"),
                    target_file = rel.target.file.as_deref().unwrap_or("-"),
                    %reason,
                    "Dropping relationship"
                );
                model.dropped.push(DroppedRelationship {
                    index,
                    relationship_id: rel.relationship_id.clone(),
                    reason,
                });
            }
        }
    }

    debug!(
        nodes = model.nodes.len(),
        edges = model.edges.len(),
        dropped = model.dropped.len(),
        "Graph transform complete"
    );
    model
}

/// Resolve both endpoints to column node ids. Files are checked before
/// columns, source before target.
fn resolve(result: &AnalysisResult, rel: &Relationship) -> Result<(NodeId, NodeId), DropReason> {
    if rel.malformed.is_some() {
        return Err(DropReason::Malformed);
    }
    let source_file = rel
        .source
        .file
        .as_deref()
        .and_then(|f| result.file_position(f))
        .ok_or(DropReason::SourceFileNotFound)?;
    let target_file = rel
        .target
        .file
        .as_deref()
        .and_then(|f| result.file_position(f))
        .ok_or(DropReason::TargetFileNotFound)?;

    let source_col = rel
        .source
        .column
        .as_deref()
        .and_then(|c| result.files[source_file].column_position(c))
        .ok_or(DropReason::SourceColumnNotFound)?;
    let target_col = rel
        .target
        .column
        .as_deref()
        .and_then(|c| result.files[target_file].column_position(c))
        .ok_or(DropReason::TargetColumnNotFound)?;

    Ok((
        NodeId::column(source_file, source_col),
        NodeId::column(target_file, target_col),
    ))
}

fn build_edge(index: usize, rel: &Relationship, source: NodeId, target: NodeId) -> GraphEdge {
    GraphEdge {
        id: format!("edge-{index}"),
        source,
        target,
        label: format!(
            "{} → {}",
            rel.source.column.as_deref().unwrap_or_default(),
            rel.target.column.as_deref().unwrap_or_default()
        ),
        confidence_level: rel.confidence(),
        style: EdgeStyle::for_declared(rel.confidence_level.as_deref()),
        relationship: rel.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnProfile, Endpoint, FileProfile};

    fn orders_customers() -> AnalysisResult {
        AnalysisResult::new(
            vec![
                FileProfile::new(
                    "orders.xlsx",
                    vec![
                        ColumnProfile::new("order_id", "integer").primary_key(),
                        ColumnProfile::new("customer_id", "integer").foreign_key(),
                        ColumnProfile::new("amount", "float"),
                    ],
                ),
                FileProfile::new(
                    "customers.xlsx",
                    vec![
                        ColumnProfile::new("id", "integer").primary_key(),
                        ColumnProfile::new("name", "string"),
                    ],
                ),
            ],
            vec![
                Relationship::new(
                    "rel-1",
                    Endpoint::new("orders.xlsx", "customer_id"),
                    Endpoint::new("customers.xlsx", "id"),
                )
                .with_level("HIGH"),
            ],
        )
    }

    #[test]
    fn orders_customers_scenario() {
        let model = transform(&orders_customers());
        assert_eq!(model.nodes.len(), 7);
        assert_eq!(model.file_nodes().count(), 2);
        assert_eq!(model.edges.len(), 1);
        assert!(model.dropped.is_empty());

        let edge = &model.edges[0];
        assert_eq!(edge.id, "edge-0");
        assert_eq!(edge.source, NodeId::column(0, 1));
        assert_eq!(edge.target, NodeId::column(1, 0));
        assert_eq!(edge.confidence_level, ConfidenceLevel::High);
        assert_eq!(edge.label, "customer_id → id");
        assert!(edge.style.animated);
        assert_eq!(edge.relationship.relationship_id.as_deref(), Some("rel-1"));
    }

    #[test]
    fn node_ids_and_parents_are_positional() {
        let model = transform(&orders_customers());
        let ids: Vec<&str> = model.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "file-0",
                "file-0-col-0",
                "file-0-col-1",
                "file-0-col-2",
                "file-1",
                "file-1-col-0",
                "file-1-col-1",
            ]
        );
        let children = model.column_nodes_of(&NodeId::file(1));
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|n| n.parent == Some(NodeId::file(1))));
    }

    #[test]
    fn layout_positions() {
        let model = transform(&orders_customers());
        let file1 = model.node(&NodeId::file(1)).unwrap();
        assert!((file1.position.x - 400.0).abs() < f64::EPSILON);
        let col2 = model.node(&NodeId::column(0, 2)).unwrap();
        assert!((col2.position.y - 160.0).abs() < f64::EPSILON);
        // Primary-key columns get the highlighted background.
        let pk = model.node(&NodeId::column(0, 0)).unwrap();
        assert_eq!(pk.style.background, "#fef3c7");
    }

    #[test]
    fn unknown_source_file_is_dropped_without_touching_nodes() {
        let base = orders_customers();
        let mut with_bad = base.clone();
        with_bad.relationships.push(
            Relationship::new(
                "rel-bad",
                Endpoint::new("missing.xlsx", "id"),
                Endpoint::new("customers.xlsx", "id"),
            )
            .with_level("LOW"),
        );

        let clean = transform(&base);
        let model = transform(&with_bad);
        assert_eq!(model.nodes, clean.nodes);
        assert_eq!(model.edges.len(), 1);
        assert_eq!(
            model.dropped,
            vec![DroppedRelationship {
                index: 1,
                relationship_id: Some("rel-bad".into()),
                reason: DropReason::SourceFileNotFound,
            }]
        );
    }

    #[test]
    fn only_relationship_unresolved_yields_no_edges() {
        let mut result = orders_customers();
        result.relationships[0].source.file = Some("nowhere.csv".into());
        let model = transform(&result);
        assert_eq!(model.nodes.len(), 7);
        assert!(model.edges.is_empty());
        assert_eq!(model.dropped.len(), 1);
    }

    #[test]
    fn drop_reasons_follow_check_order() {
        let mut result = orders_customers();
        result.relationships = vec![
            Relationship::new(
                "a",
                Endpoint::new("orders.xlsx", "customer_id"),
                Endpoint::new("x", "id"),
            ),
            Relationship::new(
                "b",
                Endpoint::new("orders.xlsx", "nope"),
                Endpoint::new("customers.xlsx", "nope"),
            ),
            Relationship::new(
                "c",
                Endpoint::new("orders.xlsx", "customer_id"),
                Endpoint::new("customers.xlsx", "nope"),
            ),
            Relationship {
                relationship_id: Some("d".into()),
                ..Relationship::default()
            },
        ];
        let model = transform(&result);
        let reasons: Vec<_> = model.dropped.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                DropReason::TargetFileNotFound,
                DropReason::SourceColumnNotFound,
                DropReason::TargetColumnNotFound,
                DropReason::SourceFileNotFound,
            ]
        );
    }

    #[test]
    fn edge_ids_keep_relationship_index_across_drops() {
        let mut result = orders_customers();
        result.relationships.insert(
            0,
            Relationship::new("bad", Endpoint::new("x", "y"), Endpoint::new("x", "y")),
        );
        result.relationships.push(
            Relationship::new(
                "rel-2",
                Endpoint::new("orders.xlsx", "order_id"),
                Endpoint::new("customers.xlsx", "name"),
            )
            .with_level("LOW"),
        );
        let model = transform(&result);
        let ids: Vec<&str> = model.edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["edge-1", "edge-2"]);
    }

    #[test]
    fn malformed_entries_are_dropped_in_place() {
        let result: AnalysisResult = serde_json::from_value(serde_json::json!({
            "files": [
                {"file_name": "orders.xlsx", "columns": [
                    {"column_name": "x", "null_count": 0.0},
                    {"column_name": "customer_id"},
                ]},
                {"file_name": "customers.xlsx", "row_count": 2.0, "columns": [{"column_name": "id"}]},
            ],
            "relationships": [
                {"relationship_id": "r0",
                 "source": {"file": "customers.xlsx", "column": "id"},
                 "target": {"file": "orders.xlsx", "column": "x"},
                 "statistics": {"data_quality_warnings": null}},
                "not a relationship",
                {"relationship_id": "r2",
                 "source": {"file": "orders.xlsx", "column": "customer_id"},
                 "target": {"file": "customers.xlsx", "column": "id"},
                 "statistics": {"orphans_in_source": 3.0}},
            ]
        }))
        .unwrap();

        let model = transform(&result);
        let labels: Vec<(&str, &str)> = model
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), n.label.as_str()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("file-0", "orders.xlsx"),
                ("file-0-col-0", "x"),
                ("file-0-col-1", "customer_id"),
                ("file-1", "customers.xlsx"),
                ("file-1-col-0", "id"),
            ]
        );

        let edges: Vec<(&str, &str, &str)> = model
            .edges
            .iter()
            .map(|e| (e.id.as_str(), e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(
            edges,
            vec![
                ("edge-0", "file-1-col-0", "file-0-col-0"),
                ("edge-2", "file-0-col-1", "file-1-col-0"),
            ]
        );
        assert_eq!(
            model.dropped,
            vec![DroppedRelationship {
                index: 1,
                relationship_id: None,
                reason: DropReason::Malformed,
            }]
        );
    }

    #[test]
    fn empty_endpoint_names_do_not_match_unnamed_nodes() {
        let result: AnalysisResult = serde_json::from_value(serde_json::json!({
            "files": [
                {"columns": [{}]},
                {"file_name": "b.csv", "columns": [{"column_name": "id"}]},
            ],
            "relationships": [
                {"source": {"file": "", "column": ""}, "target": {"file": "b.csv", "column": "id"}},
                {"source": {"file": "b.csv", "column": ""}, "target": {"file": "b.csv", "column": "id"}},
            ]
        }))
        .unwrap();
        let model = transform(&result);
        assert!(model.edges.is_empty());
        let reasons: Vec<_> = model.dropped.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![DropReason::SourceFileNotFound, DropReason::SourceColumnNotFound]
        );
    }

    #[test]
    fn missing_level_defaults_to_medium_with_fallback_style() {
        let mut result = orders_customers();
        result.relationships[0].confidence_level = None;
        let model = transform(&result);
        let edge = &model.edges[0];
        assert_eq!(edge.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(edge.style, EdgeStyle::for_declared(None));
        assert_eq!(edge.style.stroke, "#6b7280");
        assert!(!edge.style.animated);
    }

    #[test]
    fn style_switch_covers_every_level() {
        assert_eq!(EdgeStyle::for_declared(Some("HIGH")).stroke_width, 3);
        assert_eq!(EdgeStyle::for_declared(Some("MEDIUM")).dash_array, Some("5,5"));
        assert_eq!(EdgeStyle::for_declared(Some("LOW")).dash_array, Some("2,2"));
        let other = EdgeStyle::for_declared(Some("CERTAIN"));
        assert_eq!(other.stroke, "#6b7280");
        assert_eq!(other.marker_color(), other.stroke);
    }

    #[test]
    fn legacy_column_names_match_relationships() {
        let result: AnalysisResult = serde_json::from_value(serde_json::json!({
            "files": [
                {"file_name": "a.csv", "columns": [{"name": "id"}]},
                {"file_name": "b.csv", "columns": [{"column_name": "a_id", "name": "legacy"}]}
            ],
            "relationships": [
                {"relationship_id": "r", "source": {"file": "b.csv", "column": "a_id"},
                 "target": {"file": "a.csv", "column": "id"}, "confidence_level": "MEDIUM"},
                {"relationship_id": "r2", "source": {"file": "b.csv", "column": "legacy"},
                 "target": {"file": "a.csv", "column": "id"}}
            ]
        }))
        .unwrap();
        let model = transform(&result);
        assert_eq!(model.edges.len(), 1);
        assert_eq!(model.edges[0].source, NodeId::column(1, 0));
        assert_eq!(model.node(&NodeId::column(1, 0)).unwrap().label, "a_id");
        assert_eq!(model.dropped[0].reason, DropReason::SourceColumnNotFound);
    }

    #[test]
    fn duplicate_file_names_resolve_to_first() {
        let result = AnalysisResult::new(
            vec![
                FileProfile::new("same.xlsx", vec![ColumnProfile::new("id", "integer")]),
                FileProfile::new("same.xlsx", vec![ColumnProfile::new("id", "integer")]),
            ],
            vec![Relationship::new(
                "r",
                Endpoint::new("same.xlsx", "id"),
                Endpoint::new("same.xlsx", "id"),
            )],
        );
        let model = transform(&result);
        assert_eq!(model.edges[0].source, NodeId::column(0, 0));
        assert_eq!(model.edges[0].target, NodeId::column(0, 0));
    }

    #[test]
    fn transform_is_deterministic() {
        let result = orders_customers();
        assert_eq!(transform(&result), transform(&result));
    }

    #[test]
    fn empty_result_yields_empty_graph() {
        let model = transform(&AnalysisResult::default());
        assert!(model.nodes.is_empty());
        assert!(model.edges.is_empty());
    }
}
