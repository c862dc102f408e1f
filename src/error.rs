//! Error types for the extraction and aggregation pipeline.
//!
//! Only file-level and configuration-level problems surface as errors;
//! per-record problems are absorbed into run counters (see
//! [`crate::models::Disposition`]).

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a pipeline command.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The input file named on the command line does not exist.
    #[error("input file not found: {0}")]
    InputMissing(PathBuf),

    /// No input was named and no `*.jsonl` extract exists under the
    /// layer's raw directory.
    #[error("no JSONL extract found under {0}")]
    NoRawExtract(PathBuf),

    /// The requested market layer is not registered.
    #[error("unknown market layer: '{0}'. Run `radar markets` to list layers")]
    UnknownLayer(String),

    /// Filesystem failure on a path the run cannot continue without.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}
