use serde::Serialize;
use tracing::debug;

use crate::types::{ConfirmPreviewRequest, FilePreview, FileSelection, PreviewResponse};

/// Summary numbers for one previewed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub total_rows: u64,
    pub total_columns: u64,
    pub duplicate_groups: usize,
    /// Columns across all duplicate groups, kept columns included.
    pub duplicate_columns: usize,
}

impl From<&FilePreview> for FileStats {
    fn from(file: &FilePreview) -> Self {
        Self {
            total_rows: file.row_count,
            total_columns: file.column_count,
            duplicate_groups: file.duplicate_groups.len(),
            duplicate_columns: file.duplicate_groups.iter().map(|g| g.columns.len()).sum(),
        }
    }
}

/// Preview data plus per-file column deletion selections.
///
/// Selections are kept in preview file order so the confirm payload is
/// stable. Each file's list keeps insertion order.
#[derive(Debug, Default)]
pub struct PreviewStore {
    preview: Option<PreviewResponse>,
    selections: Vec<FileSelection>,
    loading: bool,
    error: Option<String>,
    selected_file: usize,
}

fn recommended(file: &FilePreview) -> FileSelection {
    let mut columns_to_delete: Vec<String> = Vec::new();
    for group in &file.duplicate_groups {
        for col in group.recommended_deletions() {
            if !columns_to_delete.iter().any(|c| c == col) {
                columns_to_delete.push(col.to_string());
            }
        }
    }
    FileSelection {
        file_id: file.file_id.clone(),
        columns_to_delete,
    }
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install preview data and pre-select every recommended deletion.
    pub fn load(&mut self, preview: PreviewResponse) {
        self.selections = preview.files.iter().map(recommended).collect();
        self.preview = Some(preview);
        self.error = None;
    }

    pub fn preview(&self) -> Option<&PreviewResponse> {
        self.preview.as_ref()
    }

    pub fn preview_id(&self) -> Option<&str> {
        self.preview.as_ref().map(|p| p.preview_id.as_str())
    }

    pub fn files(&self) -> &[FilePreview] {
        self.preview
            .as_ref()
            .map(|p| p.files.as_slice())
            .unwrap_or_default()
    }

    pub fn selections(&self) -> &[FileSelection] {
        &self.selections
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Record a failure; also ends any loading state.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.loading = false;
    }

    pub fn set_selected_file(&mut self, index: usize) {
        self.selected_file = index;
    }

    pub fn selected_file(&self) -> Option<&FilePreview> {
        self.files().get(self.selected_file)
    }

    /// Add the column to the file's deletion list if absent, remove it if
    /// present. Returns whether the column is marked afterwards; file ids
    /// that are not in the preview are ignored.
    pub fn toggle_column_deletion(&mut self, file_id: &str, column: &str) -> bool {
        let Some(selection) = self.selections.iter_mut().find(|s| s.file_id == file_id) else {
            debug!(file_id, column, "Toggle for a file not in the preview, ignoring");
            return false;
        };
        let cols = &mut selection.columns_to_delete;
        if let Some(pos) = cols.iter().position(|c| c == column) {
            cols.remove(pos);
            false
        } else {
            cols.push(column.to_string());
            true
        }
    }

    /// Discard manual changes and restore the recommended selections.
    pub fn select_all_recommended(&mut self) {
        if let Some(preview) = &self.preview {
            self.selections = preview.files.iter().map(recommended).collect();
        }
    }

    /// Keep every column in every file.
    pub fn clear_selections(&mut self) {
        if let Some(preview) = &self.preview {
            self.selections = preview
                .files
                .iter()
                .map(|f| FileSelection {
                    file_id: f.file_id.clone(),
                    columns_to_delete: Vec::new(),
                })
                .collect();
        }
    }

    pub fn is_marked(&self, file_id: &str, column: &str) -> bool {
        self.selections
            .iter()
            .find(|s| s.file_id == file_id)
            .is_some_and(|s| s.columns_to_delete.iter().any(|c| c == column))
    }

    pub fn total_columns_to_delete(&self) -> usize {
        self.selections.iter().map(|s| s.columns_to_delete.len()).sum()
    }

    /// Body for `POST /jobs/preview/{id}/confirm`.
    pub fn confirm_payload(&self) -> ConfirmPreviewRequest {
        ConfirmPreviewRequest {
            file_selections: self.selections.clone(),
        }
    }

    pub fn file_stats(&self, file_id: &str) -> Option<FileStats> {
        self.files()
            .iter()
            .find(|f| f.file_id == file_id)
            .map(FileStats::from)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
