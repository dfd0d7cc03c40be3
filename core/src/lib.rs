//! Shared data model, SRT parsing, config, and error kinds for the
//! Script-to-Scene pipeline.

pub mod cell;
pub mod config;
pub mod error;
pub mod model;
pub mod srt;

pub use cell::{int_at, list_at, text_at, CellValue};
pub use config::{DuplicateDetectionConfig, DuplicateMode, PipelineConfig, VideoMode};
pub use error::PipelineError;
pub use model::{
    Character, DirectorPlanEntry, DirectorPlanStatus, Location, Scene, ScenePlan, Segment,
    StoryAnalysis, SCHEMA_VERSION,
};
pub use srt::{SrtDocument, SrtEntry};
