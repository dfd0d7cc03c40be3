//! Script-to-Scene pipeline orchestration: the seven LLM-driven stages,
//! the pure validators and synthesizers they share, and the Stage
//! Runner that drives them against a workbook checkpoint.

pub mod coverage;
pub mod fallback;
pub mod llm_json;
pub mod reference;
pub mod runner;
pub mod stages;
pub mod synth;

pub use runner::run_pipeline;
