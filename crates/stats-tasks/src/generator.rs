//! Task generation: input region to tiles, tiles to (tile, epoch) tasks.

use std::path::Path;

use tracing::{debug, info};

use stats_common::{date_sequence, BoundingBox, DateRange, GridSpec, TileIndex};
use stats_config::{InputRegionMode, InputRegionSpec, SourceSpec, StatsConfig};

use crate::error::TaskError;
use crate::model::{PlannedTask, StatsTask, TaskPlan, TaskSource};
use crate::output::OutputProduct;

/// Resolve an input region to the tiles it selects.
pub fn resolve_tiles(
    region: &InputRegionSpec,
    grid: &GridSpec,
) -> Result<Vec<TileIndex>, TaskError> {
    match region.mode()? {
        InputRegionMode::Tiles(tiles) => Ok(tiles),
        InputRegionMode::FromFile(path) => tiles_from_file(&path, grid),
        InputRegionMode::Gridded(bounds) => {
            let tiles = grid.tiles_covering(&bounds);
            if tiles.is_empty() {
                // Degenerate bounds select nothing; treat like any other
                // empty region selector.
                return Err(stats_config::ConfigurationError::EmptyInputRegion.into());
            }
            Ok(tiles)
        }
    }
}

/// Load a tile selection from a file.
///
/// `.geojson`/`.json` files contribute the coordinate extent of whatever
/// geometry they contain (coordinates are taken in the grid CRS); anything
/// else is read as plain text with one `x,y` tile index per line, `#`
/// starting a comment.
fn tiles_from_file(path: &Path, grid: &GridSpec) -> Result<Vec<TileIndex>, TaskError> {
    let content = std::fs::read_to_string(path).map_err(|source| TaskError::RegionFileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let tiles = if extension == "geojson" || extension == "json" {
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|err| TaskError::RegionFileParse {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        let bounds = geojson_extent(&value).ok_or_else(|| TaskError::EmptyRegionFile {
            path: path.to_path_buf(),
        })?;
        debug!(?bounds, "Derived region bounds from vector file");
        grid.tiles_covering(&bounds)
    } else {
        parse_tile_lines(&content, path)?
    };

    if tiles.is_empty() {
        return Err(TaskError::EmptyRegionFile {
            path: path.to_path_buf(),
        });
    }
    Ok(tiles)
}

fn parse_tile_lines(content: &str, path: &Path) -> Result<Vec<TileIndex>, TaskError> {
    let mut tiles = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let tile = line
            .parse::<TileIndex>()
            .map_err(|err| TaskError::RegionFileParse {
                path: path.to_path_buf(),
                message: format!("line {}: {err}", lineno + 1),
            })?;
        tiles.push(tile);
    }
    Ok(tiles)
}

/// Coordinate extent of any GeoJSON value.
///
/// Walks every `coordinates` member and folds all `[x, y, ...]` positions
/// into one bounding box; geometry types do not matter for tiling.
fn geojson_extent(value: &serde_json::Value) -> Option<BoundingBox> {
    fn fold_positions(value: &serde_json::Value, bounds: &mut Option<BoundingBox>) {
        if let Some(array) = value.as_array() {
            if let (Some(x), Some(y)) = (
                array.first().and_then(|v| v.as_f64()),
                array.get(1).and_then(|v| v.as_f64()),
            ) {
                match bounds {
                    Some(b) => b.expand_to(x, y),
                    None => *bounds = Some(BoundingBox::new(x, y, x, y)),
                }
            } else {
                for item in array {
                    fold_positions(item, bounds);
                }
            }
        }
    }

    fn walk(value: &serde_json::Value, bounds: &mut Option<BoundingBox>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, item) in map {
                    if key == "coordinates" {
                        fold_positions(item, bounds);
                    } else {
                        walk(item, bounds);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    walk(item, bounds);
                }
            }
            _ => {}
        }
    }

    let mut bounds = None;
    walk(value, &mut bounds);
    bounds
}

/// Clip a source to an epoch. `None` means the source has nothing in range.
fn clip_source(source: &SourceSpec, epoch: DateRange) -> Option<TaskSource> {
    let period = match source.time {
        Some(window) => window.intersect(&epoch)?,
        None => epoch,
    };
    Some(TaskSource {
        product: source.product.clone(),
        measurements: source.measurements.clone(),
        group_by: source.group_by.clone(),
        mask_nodata: source.mask_nodata,
        fuse_func: source.fuse_func.clone(),
        masks: source.masks.clone(),
        period,
    })
}

/// Generate every (tile, epoch) task for a validated configuration.
///
/// Tasks whose sources are all outside the epoch are not emitted.
pub fn generate_tasks(config: &StatsConfig, grid: &GridSpec) -> Result<Vec<StatsTask>, TaskError> {
    let region = config.input_region.as_ref().ok_or(TaskError::NoInputRegion)?;
    let tiles = resolve_tiles(region, grid)?;

    let dr = &config.date_ranges;
    let epochs = date_sequence(dr.start_date, dr.end_date, dr.stats_duration, dr.step_size);

    let mut tasks = Vec::with_capacity(tiles.len() * epochs.len());
    for epoch in &epochs {
        let sources: Vec<TaskSource> = config
            .sources
            .iter()
            .filter_map(|source| clip_source(source, *epoch))
            .collect();
        if sources.is_empty() {
            debug!(epoch = %epoch, "No sources in range, skipping epoch");
            continue;
        }
        for &tile in &tiles {
            tasks.push(StatsTask {
                tile,
                bounds: grid.tile_bbox(tile),
                period: *epoch,
                sources: sources.clone(),
            });
        }
        info!(epoch = %epoch, tiles = tiles.len(), "Created tasks for epoch");
    }
    Ok(tasks)
}

/// Build the complete plan: tasks plus resolved output filenames.
pub fn build_plan(config: &StatsConfig) -> Result<TaskPlan, TaskError> {
    let grid = config.grid().map_err(stats_config::ConfigurationError::Grid)?;
    let tasks = generate_tasks(config, &grid)?;

    let products: Vec<OutputProduct> = config
        .output_products
        .iter()
        .map(|spec| OutputProduct::from_spec(spec, config.storage.driver))
        .collect::<Result<_, _>>()?;

    let planned = tasks
        .into_iter()
        .map(|task| {
            let outputs = products
                .iter()
                .map(|product| {
                    let path = product.output_path(&config.location, &task);
                    (product.name.clone(), path.to_string_lossy().into_owned())
                })
                .collect();
            PlannedTask { task, outputs }
        })
        .collect();

    Ok(TaskPlan {
        location: config.location.clone(),
        crs: config.storage.crs.clone(),
        products: products.into_iter().map(|p| p.name).collect(),
        tasks: planned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn grid() -> GridSpec {
        GridSpec::new("EPSG:3577", (100_000.0, 100_000.0), (25.0, -25.0)).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_resolve_explicit_tiles() {
        let region = InputRegionSpec {
            tiles: Some(vec![TileIndex::new(8, -20), TileIndex::new(9, -20)]),
            from_file: None,
            gridded: None,
        };
        let tiles = resolve_tiles(&region, &grid()).unwrap();
        assert_eq!(tiles, vec![TileIndex::new(8, -20), TileIndex::new(9, -20)]);
    }

    #[test]
    fn test_resolve_gridded_bounds() {
        let region: InputRegionSpec = serde_yaml::from_str(
            "gridded:\n  x: [800000, 1000000]\n  y: [-2000000, -1900000]\n",
        )
        .unwrap();
        let tiles = resolve_tiles(&region, &grid()).unwrap();
        assert_eq!(tiles, vec![TileIndex::new(8, -20), TileIndex::new(9, -20)]);
    }

    #[test]
    fn test_degenerate_gridded_bounds_rejected() {
        let region: InputRegionSpec =
            serde_yaml::from_str("gridded:\n  x: [800000, 800000]\n  y: [-2000000, -1900000]\n")
                .unwrap();
        assert!(matches!(
            resolve_tiles(&region, &grid()),
            Err(TaskError::Configuration(
                stats_config::ConfigurationError::EmptyInputRegion
            ))
        ));
    }

    #[test]
    fn test_tiles_from_text_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# one tile per line").unwrap();
        writeln!(file, "8,-20").unwrap();
        writeln!(file, "9,-20  # neighbour").unwrap();
        file.flush().unwrap();

        let region = InputRegionSpec {
            tiles: None,
            from_file: Some(file.path().to_path_buf()),
            gridded: None,
        };
        let tiles = resolve_tiles(&region, &grid()).unwrap();
        assert_eq!(tiles, vec![TileIndex::new(8, -20), TileIndex::new(9, -20)]);
    }

    #[test]
    fn test_tiles_from_geojson_extent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region.geojson");
        std::fs::write(
            &path,
            r#"{
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [810000.0, -1990000.0],
                            [990000.0, -1990000.0],
                            [990000.0, -1910000.0],
                            [810000.0, -1910000.0],
                            [810000.0, -1990000.0]
                        ]]
                    }
                }]
            }"#,
        )
        .unwrap();

        let region = InputRegionSpec {
            tiles: None,
            from_file: Some(path),
            gridded: None,
        };
        let tiles = resolve_tiles(&region, &grid()).unwrap();
        assert_eq!(tiles, vec![TileIndex::new(8, -20), TileIndex::new(9, -20)]);
    }

    #[test]
    fn test_bad_region_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not a tile").unwrap();
        file.flush().unwrap();

        let region = InputRegionSpec {
            tiles: None,
            from_file: Some(file.path().to_path_buf()),
            gridded: None,
        };
        assert!(matches!(
            resolve_tiles(&region, &grid()),
            Err(TaskError::RegionFileParse { .. })
        ));

        let region = InputRegionSpec {
            tiles: None,
            from_file: Some("/nonexistent/region.txt".into()),
            gridded: None,
        };
        assert!(matches!(
            resolve_tiles(&region, &grid()),
            Err(TaskError::RegionFileRead { .. })
        ));
    }

    #[test]
    fn test_clip_source_window() {
        let source = SourceSpec {
            product: "wofs_albers".to_string(),
            measurements: vec!["water".to_string()],
            group_by: "solar_day".to_string(),
            mask_nodata: false,
            fuse_func: None,
            time: Some(DateRange::new(d(2017, 7, 15), d(2018, 1, 1))),
            masks: vec![],
        };

        // Overlapping epoch is clipped to the window.
        let clipped = clip_source(&source, DateRange::new(d(2017, 7, 1), d(2017, 8, 1))).unwrap();
        assert_eq!(clipped.period, DateRange::new(d(2017, 7, 15), d(2017, 8, 1)));

        // Disjoint epoch drops the source.
        assert!(clip_source(&source, DateRange::new(d(2018, 2, 1), d(2018, 3, 1))).is_none());
    }
}
