// Client-side upload checks, run before any network call.
#![allow(clippy::cast_precision_loss)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::UploadSection;
use crate::error::ValidationError;

const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];
const MAX_NAME_LEN: usize = 255;
const MIB: f64 = 1024.0 * 1024.0;

/// A local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        let name = name.into();
        Self {
            path: PathBuf::from(&name),
            name,
            size,
        }
    }

    /// Stat a file on disk. The name is the final path component.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: meta.len(),
        })
    }
}

/// Outcome of validating a batch: accepted files plus one message per
/// rejected file.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid_files: Vec<FileCandidate>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Vec<FileCandidate>, ValidationError> {
        if self.errors.is_empty() {
            Ok(self.valid_files)
        } else {
            Err(ValidationError::Rejected(self.errors))
        }
    }
}

pub fn is_supported_file_type(limits: &UploadSection, name: &str) -> bool {
    let lower = name.to_lowercase();
    limits
        .allowed_extensions
        .iter()
        .any(|ext| lower.ends_with(&ext.to_lowercase()))
}

/// Extension, then size, then emptiness. The first failure wins.
pub fn validate_file(limits: &UploadSection, file: &FileCandidate) -> Result<(), String> {
    if !is_supported_file_type(limits, &file.name) {
        return Err(format!(
            "File '{}' is not a valid Excel file. Allowed types: {}",
            file.name,
            limits.allowed_extensions.join(", ")
        ));
    }

    if file.size > limits.max_file_size {
        let max_mb = (limits.max_file_size as f64 / MIB).round();
        let size_mb = file.size as f64 / MIB;
        return Err(format!(
            "File '{}' ({size_mb:.2}MB) exceeds the maximum size of {max_mb}MB",
            file.name
        ));
    }

    if file.size == 0 {
        return Err(format!("File '{}' is empty", file.name));
    }

    Ok(())
}

/// Batch checks (none selected, too many) short-circuit; otherwise every
/// file is checked and the valid ones are kept.
pub fn validate_files(limits: &UploadSection, files: &[FileCandidate]) -> ValidationReport {
    if files.is_empty() {
        return ValidationReport {
            valid_files: Vec::new(),
            errors: vec!["No files selected".to_string()],
        };
    }

    if files.len() > limits.max_files {
        return ValidationReport {
            valid_files: Vec::new(),
            errors: vec![format!(
                "Maximum {} files allowed. You selected {} files.",
                limits.max_files,
                files.len()
            )],
        };
    }

    let mut report = ValidationReport::default();
    for file in files {
        match validate_file(limits, file) {
            Ok(()) => report.valid_files.push(file.clone()),
            Err(e) => report.errors.push(e),
        }
    }
    report
}

pub fn validate_file_name(name: &str) -> Result<(), String> {
    if name.contains(INVALID_NAME_CHARS) {
        return Err(format!("File name '{name}' contains invalid characters"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!(
            "File name '{name}' is too long (max {MAX_NAME_LEN} characters)"
        ));
    }
    Ok(())
}

/// Names selected more than once, each reported once, in first-seen order.
pub fn find_duplicate_files(files: &[FileCandidate]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();
    for file in files {
        if !seen.insert(file.name.as_str()) && reported.insert(file.name.as_str()) {
            duplicates.push(file.name.clone());
        }
    }
    duplicates
}

pub fn total_file_size(files: &[FileCandidate]) -> u64 {
    files.iter().map(|f| f.size).sum()
}

/// Everything the CLI checks before uploading: batch and per-file limits,
/// file names, and duplicate selections.
pub fn validate_upload(
    limits: &UploadSection,
    files: &[FileCandidate],
) -> Result<Vec<FileCandidate>, ValidationError> {
    let mut report = validate_files(limits, files);
    if !report.valid_files.is_empty() {
        for file in &report.valid_files {
            if let Err(e) = validate_file_name(&file.name) {
                report.errors.push(e);
            }
        }
        for name in find_duplicate_files(&report.valid_files) {
            report
                .errors
                .push(format!("File '{name}' was selected more than once"));
        }
    }
    report.into_result()
}
