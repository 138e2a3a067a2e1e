//! Common types shared across the stats workspace.

pub mod bbox;
pub mod grid;
pub mod template;
pub mod tile;
pub mod time;

pub use bbox::BoundingBox;
pub use grid::{GridError, GridSpec};
pub use template::{FilePathTemplate, TemplateContext, TemplateError};
pub use tile::TileIndex;
pub use time::{date_sequence, DateRange, DurationSpec, DurationUnit};
