//! Backend access: the REST surface behind [`JobsApi`] and the per-job
//! WebSocket stream.

pub mod client;
pub mod socket;
pub mod traits;

pub use client::{ApiClient, extract_error_message};
pub use socket::JobSocket;
pub use traits::JobsApi;
