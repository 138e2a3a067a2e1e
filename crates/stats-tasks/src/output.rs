//! Output file preparation and NetCDF encoding parameters.
//!
//! Mirrors the contract the output drivers enforce: filenames come from the
//! product template resolved under `location`, an existing file is an error
//! (never overwritten), and data is first written to a `.tmp` sibling that
//! the driver renames on success.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use stats_common::FilePathTemplate;
use stats_config::{
    NetcdfParams, OutputDriverKind, OutputProductSpec, ProductMetadata, StorageSpec,
};

use crate::error::TaskError;
use crate::model::StatsTask;

/// An output product with its filename template parsed.
#[derive(Debug, Clone)]
pub struct OutputProduct {
    pub name: String,
    pub statistic: String,
    pub product_type: String,
    pub driver: OutputDriverKind,
    pub output_params: NetcdfParams,
    pub metadata: Option<ProductMetadata>,
    template: FilePathTemplate,
}

impl OutputProduct {
    pub fn from_spec(
        spec: &OutputProductSpec,
        driver: OutputDriverKind,
    ) -> Result<Self, TaskError> {
        let template = FilePathTemplate::parse(&spec.file_path_template)?;
        Ok(Self {
            name: spec.name.clone(),
            statistic: spec.statistic.clone(),
            product_type: spec.product_type.clone(),
            driver,
            output_params: spec.output_params.clone(),
            metadata: spec.metadata.clone(),
            template,
        })
    }

    /// Filename for one task, relative to the output location.
    pub fn relative_path(&self, task: &StatsTask) -> PathBuf {
        PathBuf::from(self.template.format(&task.template_context(&self.name)))
    }

    /// Absolute output path for one task.
    pub fn output_path(&self, location: impl AsRef<Path>, task: &StatsTask) -> PathBuf {
        location.as_ref().join(self.relative_path(task))
    }

    /// Resolve and stage the output file for a task.
    ///
    /// Checks the extension against the driver, refuses to clobber an
    /// existing output, creates parent directories, and returns the
    /// temporary path (`<file>.<ext>.tmp`) to write into. A stale temporary
    /// from an earlier failed run is removed.
    pub fn prepare_output_file(
        &self,
        location: impl AsRef<Path>,
        task: &StatsTask,
    ) -> Result<PathBuf, TaskError> {
        let output_path = self.output_path(location, task);

        let extension = output_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if !self.driver.valid_extensions().contains(&extension) {
            return Err(TaskError::InvalidFilename {
                path: output_path,
                driver: self.driver,
            });
        }

        if output_path.exists() {
            return Err(TaskError::OutputFileAlreadyExists(output_path));
        }

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TaskError::OutputDir {
                path: output_path.clone(),
                source,
            })?;
        }

        let tmp_path = output_path.with_extension(format!("{extension}.tmp"));
        if tmp_path.exists() {
            std::fs::remove_file(&tmp_path).map_err(|source| TaskError::OutputDir {
                path: tmp_path.clone(),
                source,
            })?;
        }
        Ok(tmp_path)
    }
}

/// Encoding parameters for one NetCDF variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableParams {
    pub zlib: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complevel: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fletcher32: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contiguous: Option<bool>,
    /// Chunk sizes ordered by the storage `dimension_order`.
    pub chunksizes: Vec<usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
}

/// Per-measurement NetCDF variable parameters for an output product.
///
/// Every measurement gets the product's encoding settings plus chunk sizes
/// laid out in the storage dimension order.
pub fn netcdf_variable_params(
    product: &OutputProduct,
    storage: &StorageSpec,
    measurements: &[String],
) -> BTreeMap<String, VariableParams> {
    let chunksizes: Vec<usize> = storage
        .dimension_order
        .iter()
        .map(|&dim| storage.chunking.get(dim))
        .collect();

    measurements
        .iter()
        .map(|name| {
            let p = &product.output_params;
            (
                name.clone(),
                VariableParams {
                    zlib: p.zlib,
                    complevel: p.complevel,
                    shuffle: p.shuffle,
                    fletcher32: p.fletcher32,
                    contiguous: p.contiguous,
                    chunksizes: chunksizes.clone(),
                    attrs: p.attrs.clone(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stats_common::{DateRange, GridSpec, TileIndex};
    use stats_config::{AxisPair, ChunkShape, Dimension};

    fn task() -> StatsTask {
        let grid = GridSpec::new("EPSG:3577", (100_000.0, 100_000.0), (25.0, -25.0)).unwrap();
        let tile = TileIndex::new(8, -20);
        StatsTask {
            tile,
            bounds: grid.tile_bbox(tile),
            period: DateRange::new(
                NaiveDate::from_ymd_opt(2017, 7, 1).unwrap(),
                NaiveDate::from_ymd_opt(2017, 8, 1).unwrap(),
            ),
            sources: vec![],
        }
    }

    fn product(template: &str) -> OutputProduct {
        let spec = OutputProductSpec {
            name: "wofs_summary".to_string(),
            statistic: "wofs_summary".to_string(),
            statistic_args: BTreeMap::new(),
            product_type: "wofs_statistical_summary".to_string(),
            output_params: NetcdfParams {
                zlib: true,
                fletcher32: Some(true),
                ..Default::default()
            },
            file_path_template: template.to_string(),
            metadata: None,
        };
        OutputProduct::from_spec(&spec, OutputDriverKind::NetcdfCf).unwrap()
    }

    #[test]
    fn test_output_path() {
        let product = product("WOFS_3577_{x}_{y}_{epoch_start:%Y-%m}__summary.nc");
        let path = product.output_path("/data/wofs", &task());
        assert_eq!(
            path,
            PathBuf::from("/data/wofs/WOFS_3577_8_-20_2017-07__summary.nc")
        );
    }

    #[test]
    fn test_prepare_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let product = product("{name}/WOFS_3577_{x}_{y}_{epoch_start:%Y-%m}__summary.nc");

        let tmp = product.prepare_output_file(dir.path(), &task()).unwrap();
        assert_eq!(
            tmp,
            dir.path()
                .join("wofs_summary/WOFS_3577_8_-20_2017-07__summary.nc.tmp")
        );
        // parent directory was created
        assert!(tmp.parent().unwrap().is_dir());
    }

    #[test]
    fn test_existing_output_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let product = product("WOFS_3577_{x}_{y}_{epoch_start:%Y-%m}__summary.nc");
        let final_path = product.output_path(dir.path(), &task());
        std::fs::write(&final_path, b"").unwrap();

        assert!(matches!(
            product.prepare_output_file(dir.path(), &task()),
            Err(TaskError::OutputFileAlreadyExists(p)) if p == final_path
        ));
    }

    #[test]
    fn test_stale_tmp_removed() {
        let dir = tempfile::tempdir().unwrap();
        let product = product("WOFS_3577_{x}_{y}_{epoch_start:%Y-%m}__summary.nc");
        let stale = dir.path().join("WOFS_3577_8_-20_2017-07__summary.nc.tmp");
        std::fs::write(&stale, b"partial").unwrap();

        let tmp = product.prepare_output_file(dir.path(), &task()).unwrap();
        assert_eq!(tmp, stale);
        assert!(!tmp.exists());
    }

    #[test]
    fn test_wrong_extension_for_driver() {
        let product = product("WOFS_3577_{x}_{y}.txt");
        assert!(matches!(
            product.prepare_output_file("/tmp", &task()),
            Err(TaskError::InvalidFilename { .. })
        ));
    }

    #[test]
    fn test_netcdf_variable_params_chunk_order() {
        let product = product("WOFS_{x}_{y}.nc");
        let storage = StorageSpec {
            driver: OutputDriverKind::NetcdfCf,
            crs: "EPSG:3577".to_string(),
            tile_size: AxisPair {
                x: 100_000.0,
                y: 100_000.0,
            },
            resolution: AxisPair { x: 25.0, y: -25.0 },
            chunking: ChunkShape {
                x: 200,
                y: 300,
                time: 1,
            },
            dimension_order: vec![Dimension::Time, Dimension::Y, Dimension::X],
        };
        let params =
            netcdf_variable_params(&product, &storage, &["water".to_string()]);

        let water = &params["water"];
        assert_eq!(water.chunksizes, vec![1, 300, 200]);
        assert!(water.zlib);
        assert_eq!(water.fletcher32, Some(true));
        assert_eq!(water.complevel, None);
    }
}
