//! Explicitly owned state containers.
//!
//! Each store has a fixed set of mutation methods and no shared global
//! state; [`crate::session::AnalysisSession`] owns one of each.

pub mod graph;
pub mod job;
pub mod preview;

pub use graph::GraphStore;
pub use job::{JobStore, UploadedFile};
pub use preview::{FileStats, PreviewStore};
