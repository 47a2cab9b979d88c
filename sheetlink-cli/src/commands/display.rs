use std::fmt::Write;

use clap::ValueEnum;

use sheetlink_core::format::{
    format_large_number, format_percentage, format_relationship_type, truncate_text,
};
use sheetlink_core::response_check::ResponseReport;
use sheetlink_core::store::{FileStats, GraphStore, PreviewStore};
use sheetlink_graph::{ConfidenceLevel, GraphEdge, GraphNode, NodeData};

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Dot,
    Mermaid,
}

pub fn render(graph: &GraphStore, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Text => render_text(graph)?,
        OutputFormat::Json => render_json(graph)?,
        OutputFormat::Dot => render_dot(graph)?,
        OutputFormat::Mermaid => render_mermaid(graph)?,
    })
}

fn endpoint_label(edge: &GraphEdge) -> (String, String) {
    let side = |file: Option<&String>, column: Option<&String>| {
        format!(
            "{}.{}",
            file.map_or("?", String::as_str),
            column.map_or("?", String::as_str)
        )
    };
    let rel = &edge.relationship;
    (
        side(rel.source.file.as_ref(), rel.source.column.as_ref()),
        side(rel.target.file.as_ref(), rel.target.column.as_ref()),
    )
}

// ── Text ────────────────────────────────────────────────────────────

pub fn render_text(graph: &GraphStore) -> Result<String, std::fmt::Error> {
    let model = graph.model();
    let counts = graph.counts();
    let filter = graph.filter();
    let visible = graph.filtered_edges();
    let mut out = String::new();

    let files: Vec<&GraphNode> = model.file_nodes().collect();
    writeln!(
        out,
        "Relationship graph: {} files, {} columns, {} of {} relationships shown",
        files.len(),
        model.nodes.len() - files.len(),
        visible.len(),
        counts.total()
    )?;
    let levels: Vec<String> = ConfidenceLevel::ALL
        .iter()
        .map(|&level| {
            let state = if filter.is_visible(level) { "shown" } else { "hidden" };
            format!("{level} {} [{state}]", counts.get(level))
        })
        .collect();
    writeln!(out, "Confidence: {}", levels.join(", "))?;
    writeln!(out)?;

    for file in &files {
        if let NodeData::File(data) = &file.data {
            writeln!(
                out,
                "  {} ({} rows, {} columns)",
                file.label,
                format_large_number(data.row_count),
                data.column_count
            )?;
        }
        for column in model.column_nodes_of(&file.id) {
            if let NodeData::Column(data) = &column.data {
                let mut keys = Vec::new();
                if data.is_primary_key {
                    keys.push("PK");
                }
                if data.is_foreign_key {
                    keys.push("FK");
                }
                writeln!(
                    out,
                    "    {:<30} {:<12} {}",
                    truncate_text(&column.label, 30),
                    data.data_type,
                    keys.join(" ")
                )?;
            }
        }
    }

    if !visible.is_empty() {
        writeln!(out)?;
        writeln!(out, "Relationships:")?;
    }
    for edge in &visible {
        let (source, target) = endpoint_label(edge);
        let rel = &edge.relationship;
        writeln!(
            out,
            "  [{:<6}] {source} → {target}  {}  {}",
            edge.confidence_level.as_str(),
            format_relationship_type(rel.relationship_type.as_deref().unwrap_or_default()),
            format_percentage(rel.confidence_score, 0)
        )?;
    }

    if !model.dropped.is_empty() {
        writeln!(out)?;
        writeln!(out, "Not placed on the graph: {}", model.dropped.len())?;
        for dropped in &model.dropped {
            writeln!(
                out,
                "  #{} {}: {}",
                dropped.index,
                dropped.relationship_id.as_deref().unwrap_or("-"),
                dropped.reason
            )?;
        }
    }
    Ok(out)
}

// ── JSON ────────────────────────────────────────────────────────────

pub fn render_json(graph: &GraphStore) -> anyhow::Result<String> {
    let model = graph.model();
    let json = serde_json::json!({
        "counts": graph.counts(),
        "visible_levels": graph
            .filter()
            .visible_levels()
            .into_iter()
            .map(ConfidenceLevel::as_str)
            .collect::<Vec<_>>(),
        "nodes": model.nodes,
        "edges": graph.filtered_edges(),
        "dropped": model.dropped,
    });
    Ok(serde_json::to_string_pretty(&json)?)
}

// ── DOT ─────────────────────────────────────────────────────────────

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

pub fn render_dot(graph: &GraphStore) -> Result<String, std::fmt::Error> {
    let model = graph.model();
    let mut out = String::new();
    writeln!(out, "digraph relationships {{")?;
    writeln!(out, "  rankdir=LR;")?;
    writeln!(out, "  node [shape=box];")?;

    for (i, file) in model.file_nodes().enumerate() {
        writeln!(out, "  subgraph cluster_{i} {{")?;
        writeln!(out, "    label=\"{}\";", dot_escape(&file.label))?;
        for column in model.column_nodes_of(&file.id) {
            writeln!(
                out,
                "    \"{}\" [label=\"{}\"];",
                column.id,
                dot_escape(&column.label)
            )?;
        }
        writeln!(out, "  }}")?;
    }

    for edge in graph.filtered_edges() {
        let style = if edge.style.dash_array.is_some() {
            ", style=dashed"
        } else {
            ""
        };
        writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{}\", color=\"{}\", penwidth={}{style}];",
            edge.source,
            edge.target,
            edge.confidence_level.as_str(),
            edge.style.marker_color(),
            edge.style.stroke_width
        )?;
    }

    writeln!(out, "}}")?;
    Ok(out)
}

// ── Mermaid ─────────────────────────────────────────────────────────

fn mermaid_id(id: &str) -> String {
    id.replace(|c: char| !c.is_ascii_alphanumeric(), "_")
}

fn mermaid_label(s: &str) -> String {
    s.replace('"', "#quot;")
}

pub fn render_mermaid(graph: &GraphStore) -> Result<String, std::fmt::Error> {
    let model = graph.model();
    let mut out = String::new();
    writeln!(out, "graph LR")?;

    for file in model.file_nodes() {
        writeln!(
            out,
            "  subgraph {}[\"{}\"]",
            mermaid_id(file.id.as_str()),
            mermaid_label(&file.label)
        )?;
        for column in model.column_nodes_of(&file.id) {
            writeln!(
                out,
                "    {}[\"{}\"]",
                mermaid_id(column.id.as_str()),
                mermaid_label(&column.label)
            )?;
        }
        writeln!(out, "  end")?;
    }

    for edge in graph.filtered_edges() {
        let arrow = if edge.style.dash_array.is_some() { "-.->" } else { "-->" };
        writeln!(
            out,
            "  {} {arrow}|{}| {}",
            mermaid_id(edge.source.as_str()),
            edge.confidence_level.as_str(),
            mermaid_id(edge.target.as_str())
        )?;
    }
    Ok(out)
}

// ── Reports ─────────────────────────────────────────────────────────

pub fn render_check_report(report: &ResponseReport) -> Result<String, std::fmt::Error> {
    let s = &report.summary;
    let mut out = String::new();
    writeln!(
        out,
        "{} files, {} relationships, {} warnings",
        s.total_files, s.total_relationships, s.warning_count
    )?;
    for (i, warning) in report.warnings.iter().enumerate() {
        writeln!(out, "  {}. {warning}", i + 1)?;
    }
    Ok(out)
}

pub fn render_preview(store: &PreviewStore) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    let Some(preview_id) = store.preview_id() else {
        return Ok(out);
    };
    writeln!(out, "Preview {preview_id} ({} files)", store.files().len())?;

    for file in store.files() {
        let stats = FileStats::from(file);
        writeln!(out)?;
        writeln!(out, "{}  [{}]", file.display_name(), file.file_id)?;
        writeln!(
            out,
            "  {} rows, {} columns, {} duplicate group(s)",
            format_large_number(stats.total_rows),
            stats.total_columns,
            stats.duplicate_groups
        )?;
        for (g, group) in file.duplicate_groups.iter().enumerate() {
            writeln!(
                out,
                "  Group {}: {}, {} similar",
                g + 1,
                group.detection_type.label(),
                format_percentage(Some(group.similarity_score), 0)
            )?;
            for (i, column) in group.columns.iter().enumerate() {
                let action = if store.is_marked(&file.file_id, column) {
                    "delete"
                } else {
                    "keep"
                };
                let note = if i > 0 && group.is_content_identical(i) {
                    "  (identical content)"
                } else {
                    ""
                };
                writeln!(out, "    {action:<6} {column}{note}")?;
            }
            if !group.recommendation.is_empty() {
                writeln!(out, "    {}", group.recommendation)?;
            }
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "Columns marked for deletion: {}",
        store.total_columns_to_delete()
    )?;
    Ok(out)
}
