//! The CRS-aligned output tile grid.
//!
//! Built from the `storage` block of a statistics configuration: every output
//! tile is `tile_size` projected units on a side, anchored at the grid origin,
//! and rasterized at `resolution` units per pixel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bbox::BoundingBox;
use crate::tile::TileIndex;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("Tile size must be positive, got ({x}, {y})")]
    InvalidTileSize { x: f64, y: f64 },

    #[error("Resolution must be non-zero, got ({x}, {y})")]
    InvalidResolution { x: f64, y: f64 },

    #[error("Tile size {tile_size} is not a whole number of {resolution} pixels on the {axis} axis")]
    MisalignedTile {
        axis: char,
        tile_size: f64,
        resolution: f64,
    },
}

/// A regular tile grid in a projected CRS.
///
/// `resolution.1` is conventionally negative (north-up rasters index rows
/// downward); tile bounding boxes are always returned min/max ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Coordinate reference system identifier, e.g. `EPSG:3577`.
    pub crs: String,
    /// Tile extent in projected units (x, y).
    pub tile_size: (f64, f64),
    /// Pixel size in projected units (x, y).
    pub resolution: (f64, f64),
    /// Grid anchor point; tile (0, 0) has its low corner here.
    pub origin: (f64, f64),
}

impl GridSpec {
    /// Build a grid, checking that tiles align to whole pixels.
    pub fn new(
        crs: impl Into<String>,
        tile_size: (f64, f64),
        resolution: (f64, f64),
    ) -> Result<Self, GridError> {
        let spec = Self {
            crs: crs.into(),
            tile_size,
            resolution,
            origin: (0.0, 0.0),
        };
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<(), GridError> {
        let (sx, sy) = self.tile_size;
        let (rx, ry) = self.resolution;
        if sx <= 0.0 || sy <= 0.0 {
            return Err(GridError::InvalidTileSize { x: sx, y: sy });
        }
        if rx == 0.0 || ry == 0.0 {
            return Err(GridError::InvalidResolution { x: rx, y: ry });
        }
        for (axis, size, res) in [('x', sx, rx), ('y', sy, ry)] {
            let pixels = size / res.abs();
            if (pixels - pixels.round()).abs() > 1e-9 || pixels.round() < 1.0 {
                return Err(GridError::MisalignedTile {
                    axis,
                    tile_size: size,
                    resolution: res,
                });
            }
        }
        Ok(())
    }

    /// Pixels per tile as (columns, rows).
    pub fn tile_shape(&self) -> (usize, usize) {
        let cols = (self.tile_size.0 / self.resolution.0.abs()).round() as usize;
        let rows = (self.tile_size.1 / self.resolution.1.abs()).round() as usize;
        (cols, rows)
    }

    /// Projected bounds of a tile.
    pub fn tile_bbox(&self, tile: TileIndex) -> BoundingBox {
        let min_x = self.origin.0 + tile.x as f64 * self.tile_size.0;
        let min_y = self.origin.1 + tile.y as f64 * self.tile_size.1;
        BoundingBox::new(
            min_x,
            min_y,
            min_x + self.tile_size.0,
            min_y + self.tile_size.1,
        )
    }

    /// The tile containing a projected point. Points exactly on a boundary
    /// belong to the tile above/right of it.
    pub fn tile_containing(&self, x: f64, y: f64) -> TileIndex {
        let tx = ((x - self.origin.0) / self.tile_size.0).floor() as i32;
        let ty = ((y - self.origin.1) / self.tile_size.1).floor() as i32;
        TileIndex::new(tx, ty)
    }

    /// All tiles intersecting `bounds`, row-major from the south-west corner.
    pub fn tiles_covering(&self, bounds: &BoundingBox) -> Vec<TileIndex> {
        let lo = self.tile_containing(bounds.min_x, bounds.min_y);
        // Pull the upper corner in slightly so bounds that stop exactly on a
        // tile boundary do not pick up the next (empty) tile.
        let eps_x = self.resolution.0.abs() * 1e-6;
        let eps_y = self.resolution.1.abs() * 1e-6;
        let hi = self.tile_containing(bounds.max_x - eps_x, bounds.max_y - eps_y);

        let mut tiles = Vec::new();
        for ty in lo.y..=hi.y {
            for tx in lo.x..=hi.x {
                tiles.push(TileIndex::new(tx, ty));
            }
        }
        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn albers() -> GridSpec {
        GridSpec::new("EPSG:3577", (100_000.0, 100_000.0), (25.0, -25.0)).unwrap()
    }

    #[test]
    fn test_tile_shape() {
        assert_eq!(albers().tile_shape(), (4000, 4000));
    }

    #[test]
    fn test_tile_bbox() {
        let bbox = albers().tile_bbox(TileIndex::new(8, -20));
        assert_eq!(bbox.min_x, 800_000.0);
        assert_eq!(bbox.max_x, 900_000.0);
        assert_eq!(bbox.min_y, -2_000_000.0);
        assert_eq!(bbox.max_y, -1_900_000.0);
    }

    #[test]
    fn test_tile_containing_roundtrip() {
        let grid = albers();
        let bbox = grid.tile_bbox(TileIndex::new(8, -20));
        let mid = grid.tile_containing(
            (bbox.min_x + bbox.max_x) / 2.0,
            (bbox.min_y + bbox.max_y) / 2.0,
        );
        assert_eq!(mid, TileIndex::new(8, -20));
        // low corner is inclusive
        assert_eq!(
            grid.tile_containing(bbox.min_x, bbox.min_y),
            TileIndex::new(8, -20)
        );
    }

    #[test]
    fn test_tiles_covering() {
        let grid = albers();
        // Two tiles wide, one tall.
        let bounds = BoundingBox::new(800_000.0, -2_000_000.0, 1_000_000.0, -1_900_000.0);
        let tiles = grid.tiles_covering(&bounds);
        assert_eq!(tiles, vec![TileIndex::new(8, -20), TileIndex::new(9, -20)]);

        // A sliver inside one tile.
        let bounds = BoundingBox::new(810_000.0, -1_990_000.0, 820_000.0, -1_980_000.0);
        assert_eq!(grid.tiles_covering(&bounds), vec![TileIndex::new(8, -20)]);
    }

    #[test]
    fn test_misaligned_grid_rejected() {
        let err = GridSpec::new("EPSG:3577", (100_000.0, 100_000.0), (33.0, -33.0)).unwrap_err();
        assert!(matches!(err, GridError::MisalignedTile { axis: 'x', .. }));

        assert!(matches!(
            GridSpec::new("EPSG:3577", (0.0, 100_000.0), (25.0, -25.0)),
            Err(GridError::InvalidTileSize { .. })
        ));
    }
}
