//! Error types for diary operations.

use std::sync::Arc;

/// Error type for diary recording and export operations.
#[derive(Debug, thiserror::Error)]
pub enum DiaryError {
    /// Filesystem or sink I/O failure
    #[error("diary I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Hard failure inside the lzma codec
    #[error("lzma stream error: {0}")]
    Lzma(#[from] xz2::stream::Error),

    /// A stored pixel-format tag outside the recognized set
    #[error("unknown pixel format tag: {0}")]
    UnknownPixelFormat(i32),

    /// The external transcoder rejected input or failed to finalize
    #[error("transcoder error: {0}")]
    Transcode(String),

    /// A ring file could not be deleted within the retry budget
    #[error("could not delete diary file {path}: {source}")]
    DeleteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Shared error-signaling callback.
///
/// Failures on the writer thread and inside compression streams are reported
/// here exactly once per failed operation; no errors cross the public
/// boundary as panics.
pub type ErrorSink = Arc<dyn Fn(&DiaryError) + Send + Sync>;

/// An error sink that logs and otherwise ignores errors.
pub fn log_only_sink() -> ErrorSink {
    Arc::new(|e| tracing::error!("diary error: {e}"))
}
