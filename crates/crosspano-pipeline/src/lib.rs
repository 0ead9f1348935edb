//! crosspano-pipeline: crosshair removal and resumable Hugin stitching.
//!
//! Turns first-person game screenshots into a panorama through:
//! mask selection -> crosshair inpainting -> crop -> six Hugin stages
//! chained through `step<N>.pto` project files.
//!
//! The stages communicate only through files in the work directory, so
//! a run can be resumed at any stage with
//! [`StitchConfig::resume_point`]: earlier stages are skipped but their
//! artifact names are still computed, and every later stage sees exactly
//! the same inputs as in an uninterrupted run.

pub mod inpaint;
pub mod mask;
pub mod orchestrator;
pub mod preprocess;
pub mod report;
pub mod stage;
pub mod types;

pub use orchestrator::{Orchestrator, STAGE_COUNT, standard_stages};
pub use preprocess::{PreprocessSettings, Preprocessed, frame_file_name, frame_file_names};
pub use report::{PhaseReport, PreprocessOutcome, RunReport, StageOutcome, StageReport};
pub use stage::{
    Arg, ProcessRunner, ResolvedStage, Slot, StageError, StageExecutor, StageExit, StageRunner,
    StageTemplate, StepCounter, artifact_name,
};
pub use types::{
    ArrowCount, CropRect, Dimensions, PipelineError, PreprocessError, ResumePoint, StitchConfig,
    ValidationError,
};

/// Run the full pipeline with the Hugin tools as child processes.
///
/// Convenience wrapper around [`Orchestrator::new`] and
/// [`Orchestrator::run`].
///
/// # Errors
///
/// See [`Orchestrator::run`].
pub fn stitch(
    captures: &[std::path::PathBuf],
    config: StitchConfig,
) -> Result<RunReport, PipelineError> {
    Orchestrator::new(config).run(captures)
}
