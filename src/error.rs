//! Error types for the edge cache engine

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting edges or computing intersections.
///
/// Cache misses, tolerance mismatches and evictions are not errors and never
/// show up here.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Geometry Kernel Errors
    // =========================================================================
    /// An edge produced unusable geometry
    #[error("Invalid geometry on edge {edge_index}: {reason}")]
    InvalidGeometry { edge_index: usize, reason: String },

    /// The geometry kernel delegate failed
    #[error("Geometry kernel error: {0}")]
    Kernel(String),

    /// Shape has no edges to work with
    #[error("Shape contains no edges")]
    EmptyShape,

    // =========================================================================
    // Task Errors
    // =========================================================================
    /// The background worker panicked
    #[error("Worker panicked: {0}")]
    TaskPanicked(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
