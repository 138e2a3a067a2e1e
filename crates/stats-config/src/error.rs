//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Raised when the configuration document is malformed or inconsistent.
/// All validation happens before any planning or computation begins.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to read configuration from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unclosed environment variable substitution: ${{{0}")]
    UnclosedSubstitution(String),

    #[error("Environment variable {0} is not set and has no default")]
    MissingEnvVar(String),

    #[error("Configuration must list at least one source")]
    NoSources,

    #[error("Source '{0}' must list at least one measurement")]
    NoMeasurements(String),

    #[error("Source '{product}' has an invalid fuse_func '{fuse_func}': expected a dotted path")]
    InvalidFuseFunc { product: String, fuse_func: String },

    #[error("date_ranges is inverted: start_date {start} is after end_date {end}")]
    InvertedDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("date_ranges produces no epochs between {start} and {end} with duration {duration}")]
    EmptyDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        duration: String,
    },

    #[error("Invalid storage grid: {0}")]
    Grid(#[from] stats_common::GridError),

    #[error("Chunk size for '{dim}' must be positive")]
    NonPositiveChunk { dim: &'static str },

    #[error(
        "computation.chunking.{dim} ({computation}) must be a multiple of \
         storage.chunking.{dim} ({storage})"
    )]
    ChunkMismatch {
        dim: &'static str,
        computation: usize,
        storage: usize,
    },

    #[error("dimension_order {0:?} must be a permutation of [time, y, x]")]
    InvalidDimensionOrder(Vec<String>),

    #[error("input_region is ambiguous: exactly one of tiles, from_file, gridded must be given")]
    AmbiguousInputRegion,

    #[error("input_region selects no tiles")]
    EmptyInputRegion,

    #[error("Configuration must define at least one output product")]
    NoOutputProducts,

    #[error("Duplicate output product name '{0}'")]
    DuplicateProduct(String),

    #[error("Output product '{product}': {message}")]
    InvalidProduct { product: String, message: String },
}
