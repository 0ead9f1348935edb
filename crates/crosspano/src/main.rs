//! crosspano: stitch crosshair-free panoramas from game screenshots.
//!
//! Removes the bow reticle from each screenshot, crops to the visible
//! area, and drives the Hugin command-line tools through project
//! generation, control points, line finding, optimisation, pano settings
//! and stitching. Every stage writes `step<N>.pto` into the work
//! directory, so an interrupted run can be resumed with `--first-step`.
//!
//! # Usage
//!
//! ```text
//! crosspano [OPTIONS] <IMAGES>...
//! ```
//!
//! Logging goes to stderr (`RUST_LOG` or `-v` to adjust); stdout carries
//! only the `--json` report.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use crosspano_pipeline::{ArrowCount, ResumePoint, StitchConfig};
use tracing_subscriber::EnvFilter;

/// Stitch a panorama from screenshots with a crosshair overlay.
///
/// Screenshots are processed in the order given. Crosshair masks are
/// looked up next to the executable unless `--mask-dir` is set.
#[derive(Parser)]
#[command(name = "crosspano", version)]
struct Cli {
    /// Input screenshots, in stitching order.
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// First stage to run (1-6). Earlier stages are assumed done;
    /// values of 1 or less also redo crosshair removal.
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    first_step: i64,

    /// Whether ZR (bow drawn) was held in the screenshots.
    #[arg(long, value_enum, default_value_t = YesNo::Yes)]
    holding_zr: YesNo,

    /// Number of arrows shown on screen (0-999).
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    arrows: i64,

    /// Directory containing the crosshair mask images.
    #[arg(long, value_name = "DIR")]
    mask_dir: Option<PathBuf>,

    /// Directory for normalized frames and project files.
    #[arg(long, value_name = "DIR", default_value = StitchConfig::DEFAULT_WORK_DIR)]
    work_dir: PathBuf,

    /// Stitch the screenshots as-is, without crosshair removal.
    #[arg(long)]
    no_preprocess: bool,

    /// Keep going when a stage exits unsuccessfully.
    #[arg(long)]
    ignore_exit_status: bool,

    /// Full run configuration as a JSON string.
    ///
    /// When provided, all other configuration flags are ignored.
    /// The JSON must be a valid `StitchConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Yes/no flag value.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum YesNo {
    /// Yes.
    Yes,
    /// No.
    No,
}

/// Build a [`StitchConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual configuration flags are ignored. Validation happens here,
/// before anything touches the filesystem.
fn config_from_cli(cli: &Cli) -> Result<StitchConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let arrows = ArrowCount::new(cli.arrows).map_err(|e| e.to_string())?;

    Ok(StitchConfig {
        resume_point: ResumePoint::new(cli.first_step),
        holding_zr: cli.holding_zr == YesNo::Yes,
        arrows,
        mask_dir: cli.mask_dir.clone(),
        work_dir: cli.work_dir.clone(),
        preprocess: !cli.no_preprocess,
        check_exit_status: !cli.ignore_exit_status,
        ..StitchConfig::default()
    })
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins over `-v` when set.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "crosspano=info,crosspano_pipeline=info",
        1 => "crosspano=debug,crosspano_pipeline=debug",
        _ => "crosspano=trace,crosspano_pipeline=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?config, "configuration");

    let report = match crosspano_pipeline::stitch(&cli.images, config) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        eprintln!("{}", report.summary());
    }

    ExitCode::SUCCESS
}
