//! Pipeline composition and execution for profile processing.

mod runner;

pub use runner::{Pipeline, PipelineConfig, PipelineStep};
