//! Task planning and output preparation errors.

use std::path::PathBuf;

use thiserror::Error;

use stats_config::ConfigurationError;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Template(#[from] stats_common::TemplateError),

    #[error("No input_region configured: tiles cannot be enumerated without one")]
    NoInputRegion,

    #[error("Failed to read region file {path}: {source}")]
    RegionFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse region file {path}: {message}")]
    RegionFileParse { path: PathBuf, message: String },

    #[error("Region file {path} selects no tiles")]
    EmptyRegionFile { path: PathBuf },

    #[error("Output file already exists: {0}")]
    OutputFileAlreadyExists(PathBuf),

    #[error("Invalid filename {path} for the {driver:?} output driver")]
    InvalidFilename {
        path: PathBuf,
        driver: stats_config::OutputDriverKind,
    },

    #[error("Failed to prepare output directory for {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
