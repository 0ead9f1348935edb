//! Run report: what each phase and stage did and how long it took.
//!
//! Every [`Orchestrator::run`](crate::Orchestrator::run) returns a
//! [`RunReport`]. It is serializable so the CLI can emit it as JSON, and
//! [`RunReport::summary`] renders a human-readable table.
//!
//! Durations are serialized as fractional seconds (`f64`) since
//! `std::time::Duration` does not implement serde traits.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// One of the four preprocessing phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Decoding the raw captures.
    Load,
    /// Inpainting the crosshair.
    RemoveCrosshair,
    /// Cropping to the visible region.
    Crop,
    /// Writing normalized frames.
    Save,
}

impl Phase {
    /// Human-readable label used in logs and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Load => "Loading images",
            Self::RemoveCrosshair => "Removing crosshairs",
            Self::Crop => "Cropping",
            Self::Save => "Saving to files",
        }
    }
}

/// Timing for one preprocessing phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// Which phase.
    pub phase: Phase,
    /// Number of images the phase handled.
    pub images: usize,
    /// Wall-clock duration (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

/// What happened to preprocessing in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreprocessOutcome {
    /// Crosshairs were removed and frames written.
    Ran {
        /// Per-phase timings in execution order.
        phases: Vec<PhaseReport>,
    },
    /// The resume point is past the start; frame names were recomputed.
    Skipped,
    /// Preprocessing is turned off; raw captures were stitched directly.
    Disabled,
}

/// What happened to one external stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    /// The command was run to completion.
    Ran {
        /// Exit code, `None` if terminated by a signal.
        exit_code: Option<i32>,
        /// Wall-clock duration (seconds).
        #[serde(with = "duration_serde")]
        duration: Duration,
    },
    /// The stage is before the resume point and was not invoked.
    Skipped,
}

/// Record of one external stage call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    /// 1-based stage index.
    pub step: u32,
    /// Short stage name.
    pub name: String,
    /// Program followed by its fully substituted arguments.
    pub command: Vec<String>,
    /// Project file consumed, if any.
    pub input: Option<String>,
    /// Project file produced, if any.
    pub output: Option<String>,
    /// Whether and how the command ran.
    pub outcome: StageOutcome,
}

impl StageReport {
    /// The project file to chain into the next stage: the output if the
    /// stage produces one, otherwise its input.
    #[must_use]
    pub fn artifact(&self) -> Option<&str> {
        self.output.as_deref().or(self.input.as_deref())
    }

    /// Whether the external command was invoked.
    #[must_use]
    pub const fn executed(&self) -> bool {
        matches!(self.outcome, StageOutcome::Ran { .. })
    }
}

/// Summary of a whole stitching run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Crosshair mask selected for this run (`None` when preprocessing is
    /// disabled).
    pub mask: Option<PathBuf>,
    /// Image names handed to the first stage, in input order.
    pub frames: Vec<String>,
    /// What happened to preprocessing.
    pub preprocessing: PreprocessOutcome,
    /// Every declared stage in order, executed or skipped.
    pub stages: Vec<StageReport>,
}

impl RunReport {
    /// Format the report as a human-readable table.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Stitching Run Report\n{}", "=".repeat(60)));
        match &self.mask {
            Some(mask) => lines.push(format!("Mask: {}", mask.display())),
            None => lines.push("Mask: none".to_owned()),
        }
        lines.push(format!("Frames: {}", self.frames.len()));
        lines.push(String::new());

        match &self.preprocessing {
            PreprocessOutcome::Ran { phases } => {
                lines.push(format!("{:<24} {:>8} {:>12}", "Phase", "Images", "Duration"));
                lines.push("-".repeat(48));
                for phase in phases {
                    lines.push(format!(
                        "{:<24} {:>8} {:>10.3}ms",
                        phase.phase.label(),
                        phase.images,
                        duration_ms(phase.duration),
                    ));
                }
            }
            PreprocessOutcome::Skipped => lines.push("Preprocessing: skipped".to_owned()),
            PreprocessOutcome::Disabled => lines.push("Preprocessing: disabled".to_owned()),
        }
        lines.push(String::new());

        lines.push(format!(
            "{:<6} {:<16} {:<12} {:>12}  {}",
            "Step", "Stage", "Status", "Duration", "Artifact"
        ));
        lines.push("-".repeat(72));
        for stage in &self.stages {
            let (status, duration) = match &stage.outcome {
                StageOutcome::Ran {
                    exit_code: Some(0),
                    duration,
                } => ("ok".to_owned(), format!("{:.3}ms", duration_ms(*duration))),
                StageOutcome::Ran {
                    exit_code: Some(code),
                    duration,
                } => (
                    format!("exit {code}"),
                    format!("{:.3}ms", duration_ms(*duration)),
                ),
                StageOutcome::Ran {
                    exit_code: None,
                    duration,
                } => (
                    "signalled".to_owned(),
                    format!("{:.3}ms", duration_ms(*duration)),
                ),
                StageOutcome::Skipped => ("skipped".to_owned(), "-".to_owned()),
            };
            lines.push(format!(
                "{:<6} {:<16} {:<12} {:>12}  {}",
                stage.step,
                stage.name,
                status,
                duration,
                stage.artifact().unwrap_or("-"),
            ));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
