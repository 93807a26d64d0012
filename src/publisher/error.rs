//! Publisher-specific error types.
//!
//! Failures here never stop the consumer task; they are logged and the write
//! is retried on the next batch.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while rendering or writing the output file.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// JSON serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Creating or writing the temporary file failed.
    #[error("failed to write temporary file in '{dir}': {source}")]
    Write {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Renaming the temporary file over the output failed.
    #[error("failed to replace '{path}': {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
