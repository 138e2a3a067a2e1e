//! Tile indexes on the output grid.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A tile coordinate on the fixed CRS grid.
///
/// Indexes are signed: the Australian Albers grid runs tiles like `(8, -20)`.
/// Serialized as a two-element `[x, y]` sequence to match the configuration
/// document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileIndex {
    pub x: i32,
    pub y: i32,
}

impl Serialize for TileIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.x, self.y).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TileIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (x, y) = <(i32, i32)>::deserialize(deserializer)?;
        Ok(Self { x, y })
    }
}

impl From<(i32, i32)> for TileIndex {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl TileIndex {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

#[derive(Debug, Error)]
#[error("Invalid tile index: {0}")]
pub struct TileParseError(String);

impl FromStr for TileIndex {
    type Err = TileParseError;

    /// Parse `"8,-20"` (whitespace around the comma is tolerated).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| TileParseError(s.to_string()))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| TileParseError(s.to_string()))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| TileParseError(s.to_string()))?;
        Ok(Self { x, y })
    }
}
