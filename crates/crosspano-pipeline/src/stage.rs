//! External stage execution with resumable project-file chaining.
//!
//! Each stage is an external command described by a [`StageTemplate`]:
//! literal arguments plus at most one [`Slot::Input`] and at most one
//! [`Slot::Output`] placeholder. The [`StageExecutor`] owns the step
//! counter; for step `N` it substitutes `Input` with `step<N-1>.pto` and
//! `Output` with `step<N>.pto`, so every stage consumes the previous
//! stage's project file.
//!
//! Substitution happens whether or not the stage runs. Stages before the
//! resume point are skipped (their artifacts are assumed to exist from
//! an earlier run) but still advance the counter and still report the
//! artifact names, which keeps later stages' names identical across
//! resumed runs.

use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::report::{StageOutcome, StageReport};
use crate::types::ResumePoint;

/// Extension of the project files passed between stages.
pub const ARTIFACT_EXTENSION: &str = "pto";

/// Name of the project file produced by `step`.
#[must_use]
pub fn artifact_name(step: u32) -> String {
    format!("step{step}.{ARTIFACT_EXTENSION}")
}

/// Which project file a placeholder stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    /// The previous stage's project file.
    Input,
    /// This stage's project file.
    Output,
}

/// One argument of a stage command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arg {
    /// Passed through verbatim.
    Literal(String),
    /// Replaced with a project file name at run time.
    Placeholder(Slot),
}

impl Arg {
    /// A verbatim argument.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }
}

/// A declared external stage: program plus argument template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTemplate {
    name: String,
    program: String,
    args: Vec<Arg>,
}

impl StageTemplate {
    /// Declare a stage.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::DuplicatePlaceholder`] if `args` contains
    /// more than one placeholder for the same slot.
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: Vec<Arg>,
    ) -> Result<Self, StageError> {
        let name = name.into();
        for slot in [Slot::Input, Slot::Output] {
            let count = args
                .iter()
                .filter(|arg| **arg == Arg::Placeholder(slot))
                .count();
            if count > 1 {
                return Err(StageError::DuplicatePlaceholder { stage: name, slot });
            }
        }
        Ok(Self {
            name,
            program: program.into(),
            args,
        })
    }

    /// Short stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The program to invoke.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The unresolved argument template.
    #[must_use]
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Whether the template references `slot`.
    #[must_use]
    pub fn uses(&self, slot: Slot) -> bool {
        self.args.contains(&Arg::Placeholder(slot))
    }

    /// Substitute placeholders for `step`.
    #[must_use]
    pub fn resolve(&self, step: u32) -> ResolvedStage {
        let input = artifact_name(step.saturating_sub(1));
        let output = artifact_name(step);
        let args = self
            .args
            .iter()
            .map(|arg| match arg {
                Arg::Literal(value) => value.clone(),
                Arg::Placeholder(Slot::Input) => input.clone(),
                Arg::Placeholder(Slot::Output) => output.clone(),
            })
            .collect();

        ResolvedStage {
            step,
            name: self.name.clone(),
            program: self.program.clone(),
            args,
            input: self.uses(Slot::Input).then_some(input),
            output: self.uses(Slot::Output).then_some(output),
        }
    }
}

/// A stage with its placeholders substituted, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStage {
    /// 1-based stage index.
    pub step: u32,
    /// Short stage name.
    pub name: String,
    /// The program to invoke.
    pub program: String,
    /// Fully substituted arguments.
    pub args: Vec<String>,
    /// Project file consumed, if the template has an `Input` slot.
    pub input: Option<String>,
    /// Project file produced, if the template has an `Output` slot.
    pub output: Option<String>,
}

impl ResolvedStage {
    /// Program followed by its arguments.
    #[must_use]
    pub fn command(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// The command as a single space-separated line, for logging.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.command().join(" ")
    }
}

/// Monotonic stage counter.
///
/// Starts at 1 and only ever moves forward by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCounter(u32);

impl StepCounter {
    /// A counter positioned at the first stage.
    #[must_use]
    pub const fn new() -> Self {
        Self(1)
    }

    /// The step about to run.
    #[must_use]
    pub const fn current(self) -> u32 {
        self.0
    }

    /// Move to the next step, returning the one just left.
    pub const fn advance(&mut self) -> u32 {
        let step = self.0;
        self.0 = step.saturating_add(1);
        step
    }
}

impl Default for StepCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// How an external command terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageExit {
    /// Exit code, `None` if the process was terminated by a signal.
    pub code: Option<i32>,
}

impl StageExit {
    /// A successful exit.
    pub const SUCCESS: Self = Self { code: Some(0) };

    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self.code, Some(0))
    }
}

impl std::fmt::Display for StageExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("termination by signal"),
        }
    }
}

/// Runs resolved stage commands.
///
/// The production implementation is [`ProcessRunner`]; tests substitute
/// a recorder.
pub trait StageRunner {
    /// Run `stage` to completion.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the command could not be started.
    fn run(&mut self, stage: &ResolvedStage) -> std::io::Result<StageExit>;
}

impl<R: StageRunner + ?Sized> StageRunner for &mut R {
    fn run(&mut self, stage: &ResolvedStage) -> std::io::Result<StageExit> {
        (**self).run(stage)
    }
}

/// Runs stages as child processes inside a working directory.
///
/// Standard streams are inherited so the tools' own progress output
/// reaches the terminal. There is no timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    work_dir: PathBuf,
}

impl ProcessRunner {
    /// Run commands with `work_dir` as their current directory.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }
}

impl StageRunner for ProcessRunner {
    fn run(&mut self, stage: &ResolvedStage) -> std::io::Result<StageExit> {
        let status = Command::new(&stage.program)
            .args(&stage.args)
            .current_dir(&self.work_dir)
            .status()?;
        Ok(StageExit {
            code: status.code(),
        })
    }
}

/// Errors raised by external stages.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// A template names the same placeholder twice.
    #[error("stage {stage} uses the {slot:?} placeholder more than once")]
    DuplicatePlaceholder {
        /// The stage name.
        stage: String,
        /// The repeated slot.
        slot: Slot,
    },

    /// The command could not be started (e.g. not installed).
    #[error("stage {step} ({program}) could not be started: {source}")]
    Spawn {
        /// 1-based stage index.
        step: u32,
        /// The program.
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The command exited unsuccessfully.
    #[error("stage {step} ({program}) failed with {exit}")]
    Failed {
        /// 1-based stage index.
        step: u32,
        /// The program.
        program: String,
        /// How it exited.
        exit: StageExit,
    },
}

/// Drives stages one at a time, owning the step counter.
///
/// Create one executor per run and call [`run_stage`](Self::run_stage)
/// once per declared stage, in order.
#[derive(Debug)]
pub struct StageExecutor<R> {
    counter: StepCounter,
    resume_point: ResumePoint,
    check_exit_status: bool,
    runner: R,
}

impl<R: StageRunner> StageExecutor<R> {
    /// An executor starting at step 1.
    ///
    /// Exit statuses are checked by default.
    pub const fn new(runner: R, resume_point: ResumePoint) -> Self {
        Self {
            counter: StepCounter::new(),
            resume_point,
            check_exit_status: true,
            runner,
        }
    }

    /// Whether a non-zero exit aborts the run. When `false`, the failure
    /// is logged and reported but the next stage still runs.
    #[must_use]
    pub const fn with_exit_check(mut self, check: bool) -> Self {
        self.check_exit_status = check;
        self
    }

    /// The step the next [`run_stage`](Self::run_stage) call will use.
    #[must_use]
    pub const fn current_step(&self) -> u32 {
        self.counter.current()
    }

    /// Resolve, then run or skip, the next stage.
    ///
    /// The step counter advances exactly once, whether the stage runs,
    /// is skipped, or fails.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Spawn`] if the command cannot be started and
    /// [`StageError::Failed`] if it exits unsuccessfully while exit
    /// checking is enabled.
    pub fn run_stage(&mut self, template: &StageTemplate) -> Result<StageReport, StageError> {
        let step = self.counter.advance();
        let resolved = template.resolve(step);
        tracing::debug!(
            step,
            stage = %resolved.name,
            command = %resolved.command_line(),
            "resolved stage"
        );

        if !self.resume_point.executes(step) {
            tracing::info!("Skipping step {step}: {}", resolved.command_line());
            return Ok(report(resolved, StageOutcome::Skipped));
        }

        tracing::info!("Running step {step}: {}", resolved.command_line());
        let started = Instant::now();
        let exit = self
            .runner
            .run(&resolved)
            .map_err(|source| StageError::Spawn {
                step,
                program: resolved.program.clone(),
                source,
            })?;
        let duration = started.elapsed();

        if !exit.success() {
            if self.check_exit_status {
                return Err(StageError::Failed {
                    step,
                    program: resolved.program,
                    exit,
                });
            }
            tracing::warn!(
                "step {step} ({}) failed with {exit}; continuing",
                resolved.program
            );
        }

        Ok(report(
            resolved,
            StageOutcome::Ran {
                exit_code: exit.code,
                duration,
            },
        ))
    }

    /// Consume the executor, returning its runner.
    pub fn into_runner(self) -> R {
        self.runner
    }
}

fn report(resolved: ResolvedStage, outcome: StageOutcome) -> StageReport {
    let command = resolved.command();
    StageReport {
        step: resolved.step,
        name: resolved.name,
        command,
        input: resolved.input,
        output: resolved.output,
        outcome,
    }
}
