//! Task and plan models.

use std::collections::BTreeMap;

use serde::Serialize;

use stats_common::{BoundingBox, DateRange, TemplateContext, TileIndex};

/// One source's contribution to a task, clipped to the task epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSource {
    pub product: String,
    pub measurements: Vec<String>,
    pub group_by: String,
    pub mask_nodata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuse_func: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub masks: Vec<stats_config::MaskSpec>,
    /// The epoch intersected with the source's own time window.
    pub period: DateRange,
}

/// One unit of work: a single tile over a single epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsTask {
    pub tile: TileIndex,
    /// Projected bounds of the tile on the output grid.
    pub bounds: BoundingBox,
    pub period: DateRange,
    pub sources: Vec<TaskSource>,
}

impl StatsTask {
    /// Substitution context for output filename templates.
    pub fn template_context<'a>(&self, product_name: &'a str) -> TemplateContext<'a> {
        TemplateContext {
            tile: self.tile,
            epoch: self.period,
            name: product_name,
        }
    }
}

/// A task plus its resolved output files, keyed by product name.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedTask {
    #[serde(flatten)]
    pub task: StatsTask,
    pub outputs: BTreeMap<String, String>,
}

/// The full plan for one configuration: every task the engine would run.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPlan {
    pub location: String,
    pub crs: String,
    pub products: Vec<String>,
    pub tasks: Vec<PlannedTask>,
}

impl TaskPlan {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}
