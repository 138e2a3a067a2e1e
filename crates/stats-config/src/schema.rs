//! Schema for the statistics configuration document.
//!
//! Field names are the configuration contract and must stay bit-compatible
//! with the YAML documents the pipeline is driven by: `location`, `sources`,
//! `date_ranges`, `storage`, `computation`, `input_region`,
//! `output_products`, `global_attributes`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stats_common::{BoundingBox, DateRange, DurationSpec, GridError, GridSpec, TileIndex};

use crate::error::ConfigurationError;

/// Top-level configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Filesystem prefix all output files are written under.
    pub location: String,

    /// Input product selectors.
    pub sources: Vec<SourceSpec>,

    /// Temporal span and epoch chunking.
    pub date_ranges: DateRangesSpec,

    /// Output format, tiling grid and on-disk chunking.
    pub storage: StorageSpec,

    /// In-memory chunking used to bound peak memory during reduction.
    #[serde(default)]
    pub computation: ComputationSpec,

    /// Which spatial tiles to process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_region: Option<InputRegionSpec>,

    /// Products to write, one file per (tile, epoch) each.
    pub output_products: Vec<OutputProductSpec>,

    /// Static metadata copied verbatim into every output file.
    #[serde(default)]
    pub global_attributes: BTreeMap<String, String>,
}

impl StatsConfig {
    /// Build the output tile grid from the storage descriptor.
    pub fn grid(&self) -> Result<GridSpec, GridError> {
        GridSpec::new(
            self.storage.crs.clone(),
            (self.storage.tile_size.x, self.storage.tile_size.y),
            (self.storage.resolution.x, self.storage.resolution.y),
        )
    }
}

/// One input product selector.
///
/// Observations sharing a `group_by` key (a logical day for `solar_day`) are
/// merged by the engine using the referenced fusion function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Source product identifier, e.g. `wofs_albers`.
    pub product: String,

    /// Measurement (band) names to load.
    pub measurements: Vec<String>,

    /// Temporal grouping key.
    #[serde(default = "default_group_by")]
    pub group_by: String,

    /// Whether the engine should mask nodata values before reduction.
    #[serde(default)]
    pub mask_nodata: bool,

    /// Dotted reference to an externally resolved fusion callable,
    /// e.g. `digitalearthau.utils.wofs_fuser`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuse_func: Option<String>,

    /// Optional window clipping this source's contribution per epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateRange>,

    /// Companion mask products applied to this source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masks: Vec<MaskSpec>,
}

fn default_group_by() -> String {
    "solar_day".to_string()
}

/// A mask product applied to a source before reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskSpec {
    pub product: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, serde_yaml::Value>,
}

/// Temporal span and epoch chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRangesSpec {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Length of each epoch.
    pub stats_duration: DurationSpec,
    /// Stride between epoch starts.
    pub step_size: DurationSpec,
}

/// Output driver / file format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputDriverKind {
    #[serde(rename = "NetCDF CF")]
    NetcdfCf,
    #[serde(rename = "GeoTiff", alias = "GeoTIFF")]
    GeoTiff,
}

impl OutputDriverKind {
    /// File extensions this driver will write.
    pub fn valid_extensions(&self) -> &'static [&'static str] {
        match self {
            OutputDriverKind::NetcdfCf => &["nc"],
            OutputDriverKind::GeoTiff => &["tif", "tiff"],
        }
    }
}

/// An `{x, y}` pair of per-axis values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisPair {
    pub x: f64,
    pub y: f64,
}

/// Storage descriptor: output format, tiling grid, on-disk chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSpec {
    pub driver: OutputDriverKind,
    /// Coordinate reference system of the output grid, e.g. `EPSG:3577`.
    pub crs: String,
    /// Tile extent in projected units.
    pub tile_size: AxisPair,
    /// Pixel size in projected units; `y` is conventionally negative.
    pub resolution: AxisPair,
    /// On-disk chunk shape.
    pub chunking: ChunkShape,
    /// Dimension order of the stored arrays, a permutation of [time, y, x].
    pub dimension_order: Vec<Dimension>,
}

/// Array dimension names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Time,
    Y,
    X,
}

/// Chunk shape along each dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkShape {
    pub x: usize,
    pub y: usize,
    #[serde(default = "default_time_chunk")]
    pub time: usize,
}

impl ChunkShape {
    /// Chunk size along a named dimension.
    pub fn get(&self, dim: Dimension) -> usize {
        match dim {
            Dimension::Time => self.time,
            Dimension::Y => self.y,
            Dimension::X => self.x,
        }
    }
}

fn default_time_chunk() -> usize {
    1
}

/// In-memory chunking for the reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputationSpec {
    pub chunking: ChunkShape,
}

impl Default for ComputationSpec {
    fn default() -> Self {
        Self {
            chunking: ChunkShape {
                x: 1000,
                y: 1000,
                time: 1,
            },
        }
    }
}

/// Spatial region selector. Exactly one mode may be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRegionSpec {
    /// Explicit `[x, y]` tile indexes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<TileIndex>>,

    /// Vector file (GeoJSON) or plain-text tile list to derive tiles from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_file: Option<PathBuf>,

    /// Projected coordinate bounds; every intersecting grid tile is selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gridded: Option<GriddedRegion>,
}

/// Projected bounds for the `gridded` input-region mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GriddedRegion {
    /// `[min, max]` easting.
    pub x: (f64, f64),
    /// `[min, max]` northing.
    pub y: (f64, f64),
}

impl GriddedRegion {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::from_corners((self.x.0, self.y.0), (self.x.1, self.y.1))
    }
}

/// The resolved input-region mode.
#[derive(Debug, Clone, PartialEq)]
pub enum InputRegionMode {
    Tiles(Vec<TileIndex>),
    FromFile(PathBuf),
    Gridded(BoundingBox),
}

impl InputRegionSpec {
    /// Resolve which mode is active, rejecting ambiguous or empty selectors.
    pub fn mode(&self) -> Result<InputRegionMode, ConfigurationError> {
        match (&self.tiles, &self.from_file, &self.gridded) {
            (Some(tiles), None, None) => {
                if tiles.is_empty() {
                    Err(ConfigurationError::EmptyInputRegion)
                } else {
                    Ok(InputRegionMode::Tiles(tiles.clone()))
                }
            }
            (None, Some(path), None) => Ok(InputRegionMode::FromFile(path.clone())),
            (None, None, Some(region)) => Ok(InputRegionMode::Gridded(region.bounds())),
            _ => Err(ConfigurationError::AmbiguousInputRegion),
        }
    }
}

/// One output product descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputProductSpec {
    /// Unique product name, e.g. `wofs_summary`.
    pub name: String,

    /// Statistic identifier resolved by the engine.
    pub statistic: String,

    /// Extra arguments handed to the statistic.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub statistic_args: BTreeMap<String, serde_yaml::Value>,

    /// Product type recorded in output metadata.
    pub product_type: String,

    /// NetCDF variable encoding parameters.
    #[serde(default)]
    pub output_params: NetcdfParams,

    /// Filename template with `{x}`, `{y}`, `{name}`, `{epoch_start[:fmt]}`
    /// and `{epoch_end[:fmt]}` tokens, resolved relative to `location`.
    pub file_path_template: String,

    /// Metadata blocks embedded in the output files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ProductMetadata>,
}

/// Per-variable NetCDF encoding parameters.
///
/// The key set matches what the NetCDF writer accepts per variable; anything
/// else in the document is a validation error, not silently dropped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetcdfParams {
    #[serde(default)]
    pub zlib: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complevel: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fletcher32: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contiguous: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

/// Output product metadata blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<InstrumentMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatMetadata {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformMetadata {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMetadata {
    pub name: String,
}
