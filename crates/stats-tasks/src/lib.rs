//! Task planning for the statistics pipeline.
//!
//! Turns a validated configuration into the set of (tile, epoch) tasks the
//! statistics engine executes, resolves each task's output filenames, and
//! prepares output files the way the output drivers expect.

pub mod error;
pub mod generator;
pub mod model;
pub mod output;

pub use error::TaskError;
pub use generator::{build_plan, generate_tasks, resolve_tiles};
pub use model::{PlannedTask, StatsTask, TaskPlan, TaskSource};
pub use output::{netcdf_variable_params, OutputProduct, VariableParams};
