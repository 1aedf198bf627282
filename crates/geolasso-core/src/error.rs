//! Error types shared across the selection pipeline.

use thiserror::Error;

/// Errors surfaced to callers of the selection engine.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("No active layer selected")]
    NoActiveLayer,
    #[error("Active layer '{0}' has no features")]
    EmptyLayer(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for selection operations.
pub type SelectionResult<T> = Result<T, SelectionError>;

/// Per-feature geometry failures.
///
/// These never cross the draw → test → mutate pipeline; the offending
/// feature is treated as non-matching.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Geometry has no coordinates")]
    Empty,
    #[error("Non-finite coordinate ({x}, {y})")]
    NonFinite { x: f64, y: f64 },
    #[error("Ring has {0} coordinates, at least 4 required")]
    ShortRing(usize),
    #[error("Ring is not closed")]
    UnclosedRing,
    #[error("Line has {0} coordinates, at least 2 required")]
    ShortLine(usize),
    #[error("Geometry library failure: {0}")]
    Library(String),
}

/// Errors raised while reading layer documents.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid layer document: {0}")]
    Format(String),
}
