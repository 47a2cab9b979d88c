/// Top-level sheetlink error type.
///
/// All fallible operations in `sheetlink-core` return [`Result<T, SheetlinkError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum SheetlinkError {
    /// Error from the REST client (transport, HTTP status, decoding).
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Error from the per-job WebSocket session.
    #[error("WebSocket error: {0}")]
    Socket(#[from] SocketError),

    /// Client-side validation rejected the request before any network call.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error writing an export file.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Error decoding an analysis result payload.
    #[error("Result error: {0}")]
    Graph(#[from] sheetlink_graph::GraphError),

    /// Local file could not be read (upload sources, `--input` documents).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from REST calls against the analysis backend.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Connection-level failure (DNS, refused, TLS, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Backend returned a non-success HTTP status.
    #[error("Backend API (HTTP {status}): {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error envelope.
        message: String,
    },

    /// Response body could not be decoded into the expected shape.
    #[error("Response decode error: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from the job WebSocket session.
#[derive(thiserror::Error, Debug)]
pub enum SocketError {
    #[error("WebSocket connect failed: {0}")]
    Connect(String),

    #[error("WebSocket protocol error: {0}")]
    Protocol(String),

    #[error("WebSocket closed")]
    Closed,
}

/// Client-side validation failures.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    /// Upload validation failed; one message per problem.
    #[error("File validation failed: {}", .0.join("; "))]
    Rejected(Vec<String>),

    /// A result was requested for a job that has not completed.
    #[error("Job is not completed (status: {status})")]
    NotReady { status: String },
}

/// Errors in sheetlink configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Config parse error: {0}")]
    Parse(String),
}

/// Errors writing export files.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Nothing to export: no analysis result loaded")]
    NothingToExport,
}

/// Convenience alias for `Result<T, SheetlinkError>`.
pub type Result<T> = std::result::Result<T, SheetlinkError>;
