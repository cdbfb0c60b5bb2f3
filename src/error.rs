use thiserror::Error;

/// I/O errors that can occur when fetching local or remote content
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Locator string could not be interpreted
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// Resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// HTTP request failed or returned a non-success status
    #[error("HTTP error: {0}")]
    Http(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Local filesystem error
    #[error("Local I/O error: {0}")]
    Local(String),

    /// Fetched document is not valid JSON
    #[error("Invalid JSON in {locator}: {message}")]
    Json { locator: String, message: String },
}

/// Errors produced while decoding a single input.
///
/// A decode error is scoped to one item: the ingestion pipeline drops the
/// item from the scene and keeps going.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// I/O error while reading the input
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// The decoder does not handle this input
    #[error("Unsupported input: {reason}")]
    Unsupported { reason: String },

    /// The input claims a format but its content is invalid
    #[error("Malformed {format} data: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },

    /// The decode worker could not be acquired or failed while running
    #[error("Decode worker error: {0}")]
    Worker(String),
}

impl DecodeError {
    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        DecodeError::Unsupported {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(format: &'static str, message: impl Into<String>) -> Self {
        DecodeError::Malformed {
            format,
            message: message.into(),
        }
    }
}

/// Errors from the chunked multiscale image adapter.
///
/// Any of these during metadata parsing is fatal to the adapter for that
/// locator.
#[derive(Debug, Clone, Error)]
pub enum ChunkedImageError {
    /// I/O error while fetching metadata or chunks
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Metadata document is missing fields or inconsistent
    #[error("Invalid multiscale metadata: {0}")]
    Metadata(String),

    /// Array dtype is not a supported numeric type
    #[error("Unsupported dtype: {0}")]
    UnsupportedDtype(String),

    /// Chunks are compressed with a codec we cannot decode
    #[error("Unsupported compressor: {0}")]
    UnsupportedCompressor(String),

    /// Array memory order is not C order
    #[error("Unsupported array order: {0}")]
    UnsupportedOrder(String),

    /// Chunk payload does not match the declared chunk shape
    #[error("Invalid chunk {key}: expected {expected} bytes, got {actual}")]
    InvalidChunk {
        key: String,
        expected: usize,
        actual: usize,
    },

    /// Requested scale level does not exist
    #[error("Scale {scale} out of range ({count} scales)")]
    ScaleOutOfRange { scale: usize, count: usize },
}

/// Errors surfaced by the multi-file ingestion pipeline.
#[derive(Debug, Clone, Error)]
pub enum IngestError {
    /// Every input failed to decode
    #[error("All {} inputs failed to decode", failures.len())]
    AllDecodesFailed { failures: Vec<(String, DecodeError)> },

    /// A per-item task aborted instead of returning an error
    #[error("Decode task for {name} aborted: {message}")]
    TaskAborted { name: String, message: String },

    /// I/O error while gathering inputs
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Explicit image or label image could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Explicit chunked image could not be opened
    #[error("Chunked image error: {0}")]
    Chunked(#[from] ChunkedImageError),

    /// Label name mapping document is invalid
    #[error("Invalid label image names: {0}")]
    LabelNames(String),
}

/// Layer interface errors. These indicate a programming or configuration
/// mistake and are raised synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerError {
    /// Layer type string is not one the interface can display
    #[error("Unsupported layer type: {0}")]
    UnsupportedLayerType(String),

    /// No layer with this name exists
    #[error("Unknown layer: {0}")]
    UnknownLayer(String),
}

/// Errors from assembling a live viewer.
#[derive(Debug, Clone, Error)]
pub enum ViewerError {
    /// Ingestion failed before the viewer could be created
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// The rendering engine refused the scene
    #[error("Rendering engine error: {0}")]
    Engine(String),

    /// Layer interface error
    #[error("Layer error: {0}")]
    Layer(#[from] LayerError),
}
