//! Pipeline error kinds
//!
//! Every stage, validator, and synthesizer funnels its failures through
//! this enum so the Stage Runner can decide, in one place, whether an
//! error is recoverable locally, tolerable for the current stage, or
//! terminal for the whole run.

use thiserror::Error;

/// Errors surfaced by any pipeline component.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The SRT file is malformed: non-sequential indices or an
    /// unparsable timestamp. Always terminal.
    #[error("input invalid: {0}")]
    InputInvalid(String),

    /// 429 / 5xx / timeout from the LLM endpoint. Recovered locally by
    /// the LLM Client's backoff; only escapes if the retry budget is
    /// exhausted, at which point it is reported as `UnrecoverableApi`.
    #[error("transient API failure: {0}")]
    TransientApi(String),

    /// Non-429 4xx from the LLM endpoint, or a transient failure whose
    /// retry budget ran out.
    #[error("unrecoverable API failure: {0}")]
    UnrecoverableApi(String),

    /// A coverage validator exhausted its repair budget (recursion
    /// depth, gap-fill passes) without restoring the partition
    /// invariant. Always terminal.
    #[error("coverage irreparable: {0}")]
    CoverageIrreparable(String),

    /// LLM output could not be interpreted as the stage's required
    /// structure. Treated as a task-level error; callers that tolerate
    /// partial failures continue past it.
    #[error("could not parse LLM output: {0}")]
    ParseError(String),

    /// A stage that does not tolerate partial failure could not
    /// complete. Carries the stage name and the failure it gave up on.
    #[error("stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },

    /// Workbook read/write failure (xlsx I/O, missing sheet, etc).
    #[error("workbook error: {0}")]
    Workbook(String),

    /// Wraps any error kind that must propagate out of the Stage
    /// Runner with a non-zero exit code.
    #[error("terminal failure in stage '{stage}': {source}")]
    Terminal {
        stage: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// True for kinds that a tolerant stage (5, 6, 7) should record and
    /// continue past rather than abort on.
    pub fn is_recoverable_at_task_level(&self) -> bool {
        matches!(
            self,
            PipelineError::UnrecoverableApi(_) | PipelineError::ParseError(_)
        )
    }

    /// The process exit code this error maps to, per the CLI contract:
    /// 0 success, 2 input invalid, 3 terminal failure mid-stage.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::InputInvalid(_) => 2,
            _ => 3,
        }
    }
}
