use tracing::debug;

use sheetlink_graph::{
    ConfidenceCounts, ConfidenceFilter, ConfidenceLevel, GraphEdge, GraphModel, Relationship,
    count_by_confidence,
};

/// Graph view state: the model, its confidence filter, the visible edge
/// subset, and the relationship open in the detail view.
#[derive(Debug, Default)]
pub struct GraphStore {
    model: GraphModel,
    counts: ConfidenceCounts,
    filter: ConfidenceFilter,
    filtered: Vec<usize>,
    selected: Option<usize>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly transformed model. Counts are computed once here
    /// and every level starts visible.
    pub fn load(&mut self, model: GraphModel) {
        self.counts = count_by_confidence(&model.edges);
        self.filter = ConfidenceFilter::all_visible(self.counts);
        self.filtered = self.filter.visible_indices(&model.edges);
        self.selected = None;
        self.model = model;
        debug!(
            edges = self.model.edges.len(),
            high = self.counts.high,
            medium = self.counts.medium,
            low = self.counts.low,
            "Graph loaded"
        );
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn counts(&self) -> ConfidenceCounts {
        self.counts
    }

    pub fn filter(&self) -> &ConfidenceFilter {
        &self.filter
    }

    /// Flip one level and recompute the visible subset from the full edge set.
    pub fn toggle_confidence_level(&mut self, level: ConfidenceLevel) {
        self.filter.toggle(level);
        self.filtered = self.filter.visible_indices(&self.model.edges);
    }

    pub fn set_level_visible(&mut self, level: ConfidenceLevel, visible: bool) {
        self.filter.set_visible(level, visible);
        self.filtered = self.filter.visible_indices(&self.model.edges);
    }

    /// Edges whose level is currently visible, in edge order.
    pub fn filtered_edges(&self) -> Vec<&GraphEdge> {
        self.filtered.iter().map(|&i| &self.model.edges[i]).collect()
    }

    /// Ids of the relationships behind the visible edges. Relationships
    /// without an id are not included.
    pub fn visible_relationship_ids(&self) -> Vec<String> {
        self.filtered
            .iter()
            .filter_map(|&i| self.model.edges[i].relationship.relationship_id.clone())
            .collect()
    }

    /// Open the detail view for an edge. Returns `false` for unknown ids.
    pub fn select_relationship(&mut self, edge_id: &str) -> bool {
        self.selected = self.model.edges.iter().position(|e| e.id == edge_id);
        self.selected.is_some()
    }

    pub fn selected_edge(&self) -> Option<&GraphEdge> {
        self.selected.map(|i| &self.model.edges[i])
    }

    pub fn selected_relationship(&self) -> Option<&Relationship> {
        self.selected_edge().map(|e| &e.relationship)
    }

    pub fn close_relationship(&mut self) {
        self.selected = None;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetlink_graph::{
        AnalysisResult, ColumnProfile, Endpoint, FileProfile, Relationship, transform,
    };

    fn model(levels: &[&str]) -> GraphModel {
        let files = vec![
            FileProfile::new("orders.xlsx", vec![ColumnProfile::new("customer_id", "integer")]),
            FileProfile::new("customers.xlsx", vec![ColumnProfile::new("id", "integer")]),
        ];
        let rels = levels
            .iter()
            .enumerate()
            .map(|(i, l)| {
                Relationship::new(
                    format!("rel_{i}"),
                    Endpoint::new("orders.xlsx", "customer_id"),
                    Endpoint::new("customers.xlsx", "id"),
                )
                .with_level(l)
            })
            .collect();
        transform(&AnalysisResult::new(files, rels))
    }

    #[test]
    fn load_starts_all_visible() {
        let mut store = GraphStore::new();
        store.load(model(&["HIGH", "MEDIUM", "LOW", "LOW"]));
        assert_eq!(store.filtered_edges().len(), 4);
        assert_eq!(store.counts().low, 2);
        assert_eq!(store.filter().visible_levels().len(), 3);
    }

    #[test]
    fn toggle_recomputes_from_full_set() {
        let mut store = GraphStore::new();
        store.load(model(&["HIGH", "MEDIUM", "LOW"]));
        store.toggle_confidence_level(ConfidenceLevel::Low);
        store.toggle_confidence_level(ConfidenceLevel::High);
        let ids: Vec<_> = store.filtered_edges().iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, vec!["edge-1"]);
        assert_eq!(store.visible_relationship_ids(), vec!["rel_1"]);

        store.toggle_confidence_level(ConfidenceLevel::Low);
        store.toggle_confidence_level(ConfidenceLevel::High);
        assert_eq!(store.filtered_edges().len(), 3);
    }

    #[test]
    fn select_and_close_relationship() {
        let mut store = GraphStore::new();
        store.load(model(&["HIGH"]));
        assert!(!store.select_relationship("edge-9"));
        assert!(store.select_relationship("edge-0"));
        assert_eq!(
            store.selected_relationship().unwrap().relationship_id.as_deref(),
            Some("rel_0")
        );
        store.close_relationship();
        assert!(store.selected_edge().is_none());
    }

    #[test]
    fn reload_resets_filter_and_selection() {
        let mut store = GraphStore::new();
        store.load(model(&["HIGH"]));
        store.toggle_confidence_level(ConfidenceLevel::High);
        store.select_relationship("edge-0");
        store.load(model(&["HIGH", "LOW"]));
        assert!(store.filter().is_visible(ConfidenceLevel::High));
        assert!(store.selected_edge().is_none());
        assert_eq!(store.filtered_edges().len(), 2);

        store.clear();
        assert!(store.model().edges.is_empty());
    }
}
