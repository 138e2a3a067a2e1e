//! Configuration contract for the statistics pipeline.
//!
//! Loads and validates the declarative YAML document that drives the
//! statistics engine: output location, input product selectors, temporal
//! chunking, storage/tiling geometry, and output product metadata.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::ConfigurationError;
pub use loader::{expand_env_vars, load_config, load_config_str};
pub use schema::{
    AxisPair, ChunkShape, ComputationSpec, DateRangesSpec, Dimension, GriddedRegion,
    InputRegionMode, InputRegionSpec, MaskSpec, NetcdfParams, OutputDriverKind, OutputProductSpec,
    ProductMetadata, SourceSpec, StatsConfig, StorageSpec,
};
