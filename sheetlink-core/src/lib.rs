//! Sheetlink core library: backend client, job monitoring, view stores,
//! response checks and export.
//!
//! The usual flow is: validate the selected files ([`validate`]), create a
//! job through a [`api::JobsApi`] implementation, follow it with
//! [`monitor::JobMonitor`], then fetch the result and load it into an
//! [`session::AnalysisSession`] for filtering, rendering and export.

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod monitor;
pub mod progress;
pub mod response_check;
pub mod session;
pub mod store;
pub mod types;
pub mod validate;

pub use sheetlink_graph as graph;
