//! The fixed six-stage Hugin sequence and the run driver.
//!
//! ```text
//! captures ─▶ preprocess ─▶ nocross-cropped-*.png
//!   ─▶ 1 pto_gen        ─▶ step1.pto
//!   ─▶ 2 cpfind         ─▶ step2.pto
//!   ─▶ 3 linefind       ─▶ step3.pto
//!   ─▶ 4 autooptimiser  ─▶ step4.pto
//!   ─▶ 5 pano_modify    ─▶ step5.pto
//!   ─▶ 6 hugin_executor ─▶ panorama (named by Hugin)
//! ```
//!
//! The resume point is a single cut line across the sequence.
//! Preprocessing sits at position 1 but is governed by
//! [`ResumePoint::runs_preprocessing`] rather than the step counter.

use std::path::{Path, PathBuf};

use crate::mask;
use crate::preprocess::{self, PreprocessSettings};
use crate::report::{PreprocessOutcome, RunReport};
use crate::stage::{
    Arg, ProcessRunner, Slot, StageError, StageExecutor, StageRunner, StageTemplate,
};
use crate::types::{PipelineError, PreprocessError, StitchConfig, ValidationError};

/// Number of declared external stages.
pub const STAGE_COUNT: usize = 6;

/// Declare the six stages, in execution order.
///
/// `frames` are the image names handed to `pto_gen`. With the default
/// field of view and thread count, the argument lists match the Hugin
/// tools' documented invocations byte for byte.
///
/// # Errors
///
/// Never fails for the built-in templates; the `Result` comes from
/// [`StageTemplate::new`].
pub fn standard_stages(
    frames: &[String],
    config: &StitchConfig,
) -> Result<Vec<StageTemplate>, StageError> {
    use Arg::{Literal, Placeholder};
    use Slot::{Input, Output};

    let lit = |s: &str| Literal(s.to_owned());

    // Create the Hugin project file.
    let mut project_args = vec![
        lit("--fov"),
        Literal(config.field_of_view.to_string()),
        lit("-o"),
        Placeholder(Output),
    ];
    project_args.extend(frames.iter().cloned().map(Literal));

    Ok(vec![
        StageTemplate::new("project", "pto_gen", project_args)?,
        // Control points across multiple rows.
        StageTemplate::new(
            "control-points",
            "cpfind",
            vec![lit("--multirow"), Placeholder(Input), lit("-o"), Placeholder(Output)],
        )?,
        // Vertical lines, used as optimisation hints.
        StageTemplate::new(
            "vertical-lines",
            "linefind",
            vec![Placeholder(Input), lit("-o"), Placeholder(Output)],
        )?,
        // Positions, lens and verticals.
        StageTemplate::new(
            "optimise",
            "autooptimiser",
            vec![
                lit("-a"),
                lit("-l"),
                lit("-s"),
                Placeholder(Input),
                lit("-o"),
                Placeholder(Output),
            ],
        )?,
        // Straighten, center, crop.
        StageTemplate::new(
            "pano-settings",
            "pano_modify",
            vec![
                lit("-s"),
                lit("-c"),
                Placeholder(Input),
                lit("-o"),
                Placeholder(Output),
            ],
        )?,
        StageTemplate::new(
            "stitch",
            "hugin_executor",
            vec![
                Literal(format!("-t{}", config.stitch_threads)),
                lit("--stitching"),
                Placeholder(Input),
            ],
        )?,
    ])
}

/// Drives one stitching run.
#[derive(Debug)]
pub struct Orchestrator<R> {
    config: StitchConfig,
    runner: R,
}

impl Orchestrator<ProcessRunner> {
    /// An orchestrator that runs the Hugin tools as child processes in
    /// `config.work_dir`.
    #[must_use]
    pub fn new(config: StitchConfig) -> Self {
        let runner = ProcessRunner::new(config.work_dir.clone());
        Self { config, runner }
    }
}

impl<R: StageRunner> Orchestrator<R> {
    /// An orchestrator using a custom stage runner.
    pub const fn with_runner(config: StitchConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Run the pipeline over `captures`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Validation`] if `captures` is empty,
    /// [`PipelineError::Preprocess`] if crosshair removal fails, and
    /// [`PipelineError::Stage`] if an external stage cannot be started or
    /// (with exit checking on) fails.
    pub fn run(self, captures: &[PathBuf]) -> Result<RunReport, PipelineError> {
        if captures.is_empty() {
            return Err(ValidationError::NoInputs.into());
        }
        let config = self.config;

        let (mask, frames, preprocessing) = if !config.preprocess {
            tracing::info!("Preprocessing disabled; stitching captures as-is");
            (None, absolute_paths(captures)?, PreprocessOutcome::Disabled)
        } else if config.resume_point.runs_preprocessing() {
            // Masks are only located when they are about to be read.
            let mask_path = resolve_mask(&config)?;
            create_work_dir(&config.work_dir)?;
            let done = preprocess::preprocess(
                captures,
                &mask_path,
                &config.work_dir,
                &PreprocessSettings::from(&config),
            )?;
            (
                Some(mask_path),
                done.frames,
                PreprocessOutcome::Ran {
                    phases: done.phases,
                },
            )
        } else {
            tracing::info!(
                "Skipping preprocessing; expecting {} existing frames",
                captures.len()
            );
            (
                None,
                preprocess::frame_file_names(captures.len()),
                PreprocessOutcome::Skipped,
            )
        };

        let stages = standard_stages(&frames, &config)?;
        let mut executor = StageExecutor::new(self.runner, config.resume_point)
            .with_exit_check(config.check_exit_status);
        let mut reports = Vec::with_capacity(stages.len());
        for stage in &stages {
            reports.push(executor.run_stage(stage)?);
        }

        Ok(RunReport {
            mask,
            frames,
            preprocessing,
            stages: reports,
        })
    }
}

/// The mask for this run, from `mask_dir` or next to the executable.
fn resolve_mask(config: &StitchConfig) -> Result<PathBuf, PipelineError> {
    let dir = match &config.mask_dir {
        Some(dir) => dir.clone(),
        None => mask::install_dir().map_err(PipelineError::MaskLocation)?,
    };
    let path = mask::select_mask(&dir, config.holding_zr, config.arrows);
    tracing::info!("Using crosshair mask: {}", path.display());
    Ok(path)
}

fn create_work_dir(dir: &Path) -> Result<(), PreprocessError> {
    std::fs::create_dir_all(dir).map_err(|source| PreprocessError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Absolute forms of the raw captures, since the stages run in the work
/// directory rather than the caller's.
///
/// Paths that are not valid UTF-8 are rejected rather than passed to the
/// tools in a lossy form.
fn absolute_paths(captures: &[PathBuf]) -> Result<Vec<String>, PipelineError> {
    captures
        .iter()
        .map(|path| {
            let input_error = |source| PipelineError::InputPath {
                path: path.clone(),
                source,
            };
            let abs = std::path::absolute(path).map_err(input_error)?;
            abs.to_str().map(str::to_owned).ok_or_else(|| {
                input_error(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "path is not valid UTF-8",
                ))
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn commands(stages: &[StageTemplate], step_offset: u32) -> Vec<String> {
        stages
            .iter()
            .zip(step_offset..)
            .map(|(s, step)| s.resolve(step).command_line())
            .collect()
    }

    #[test]
    fn default_stages_match_hugin_invocations() {
        let frames = vec!["a.png".to_owned(), "b.png".to_owned()];
        let stages = standard_stages(&frames, &StitchConfig::default()).unwrap();
        assert_eq!(stages.len(), STAGE_COUNT);
        assert_eq!(
            commands(&stages, 1),
            vec![
                "pto_gen --fov 35 -o step1.pto a.png b.png",
                "cpfind --multirow step1.pto -o step2.pto",
                "linefind step2.pto -o step3.pto",
                "autooptimiser -a -l -s step3.pto -o step4.pto",
                "pano_modify -s -c step4.pto -o step5.pto",
                "hugin_executor -t4 --stitching step5.pto",
            ]
        );
    }

    #[test]
    fn only_final_stage_lacks_output() {
        let stages = standard_stages(&[], &StitchConfig::default()).unwrap();
        let (last, rest) = stages.split_last().unwrap();
        assert!(!last.uses(Slot::Output));
        assert!(rest.iter().all(|s| s.uses(Slot::Output)));
        assert!(!stages[0].uses(Slot::Input));
        assert_eq!(
            stages.iter().map(StageTemplate::program).collect::<Vec<_>>(),
            vec![
                "pto_gen",
                "cpfind",
                "linefind",
                "autooptimiser",
                "pano_modify",
                "hugin_executor"
            ]
        );
    }

    #[test]
    fn field_of_view_and_threads_come_from_config() {
        let config = StitchConfig {
            field_of_view: 50,
            stitch_threads: 8,
            ..StitchConfig::default()
        };
        let stages = standard_stages(&[], &config).unwrap();
        let lines = commands(&stages, 1);
        assert_eq!(lines[0], "pto_gen --fov 50 -o step1.pto");
        assert_eq!(lines[5], "hugin_executor -t8 --stitching step5.pto");
    }

    #[test]
    fn absolute_paths_are_absolute() {
        let paths = absolute_paths(&[PathBuf::from("shot.png")]).unwrap();
        assert!(Path::new(&paths[0]).is_absolute());
        assert!(paths[0].ends_with("shot.png"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_capture_path_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let bad = PathBuf::from(OsStr::from_bytes(b"shot-\xff.png"));
        let err = absolute_paths(&[PathBuf::from("ok.png"), bad.clone()]).unwrap_err();
        match err {
            PipelineError::InputPath { path, source } => {
                assert_eq!(path, bad);
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidData);
            }
            other => unreachable!("unexpected error: {other:?}"),
        }
    }
}
