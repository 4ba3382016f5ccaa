//! Error types
//!
//! Input problems are fatal to a call. Engine failures are recovered per
//! attempt by the pipeline and only surface when nothing succeeded.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level failure of a document assembly call
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The image or the options could not be used
    #[error(transparent)]
    Input(#[from] InputError),
    /// Every recognition attempt failed
    #[error("recognition engine failed: {0}")]
    Engine(#[from] EngineError),
    /// The visualization sink could not persist an artifact
    #[error("visualization sink failed: {0}")]
    Visualization(String),
}

/// Problems with the caller-supplied image or options
#[derive(Debug, Error)]
pub enum InputError {
    #[error("image not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to decode image {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image has zero dimension ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

/// Failure of a single recognition call
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to launch recognition engine `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("recognition engine exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("malformed engine output: {0}")]
    Parse(String),
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to hand image to engine: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T, E = AssemblyError> = std::result::Result<T, E>;
