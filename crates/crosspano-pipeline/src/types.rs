//! Shared types for the crosspano pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can reference decoded
/// captures without depending on `image` directly.
pub use image::RgbImage;

/// Re-export `GrayImage` for the single-channel crosshair mask.
pub use image::GrayImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an `image` buffer.
    #[must_use]
    pub fn of(image: &impl image::GenericImageView) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A pixel rectangle in image coordinates.
///
/// `x`/`y` are the top-left corner; the rectangle spans `width` columns
/// and `height` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    /// First column kept.
    pub x: u32,
    /// First row kept.
    pub y: u32,
    /// Number of columns kept.
    pub width: u32,
    /// Number of rows kept.
    pub height: u32,
}

impl CropRect {
    /// The visible game area of a 1280x720 capture: rows 66..=719 and
    /// columns 0..=1279. Everything above row 66 is letterbox/HUD.
    pub const CAPTURE_VISIBLE: Self = Self {
        x: 0,
        y: 66,
        width: 1280,
        height: 654,
    };

    /// Whether the rectangle lies entirely within an image of `dims`.
    #[must_use]
    pub const fn fits_within(self, dims: Dimensions) -> bool {
        // u64 so that x + width cannot overflow.
        (self.x as u64 + self.width as u64) <= dims.width as u64
            && (self.y as u64 + self.height as u64) <= dims.height as u64
    }

    /// Dimensions of the cropped output.
    #[must_use]
    pub const fn dimensions(self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }
}

impl Default for CropRect {
    fn default() -> Self {
        Self::CAPTURE_VISIBLE
    }
}

impl std::fmt::Display for CropRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// The on-screen arrow counter shown next to the crosshair.
///
/// Always in `0..=999`; the number of digits it occupies changes the
/// shape of the overlay and therefore which mask applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ArrowCount(u16);

impl ArrowCount {
    /// Largest counter value the HUD can display.
    pub const MAX: u16 = 999;

    /// No arrows.
    pub const ZERO: Self = Self(0);

    /// Validate a raw counter value.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ArrowCountOutOfRange`] if `value` is
    /// outside `0..=999`.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        u16::try_from(value)
            .ok()
            .filter(|&v| v <= Self::MAX)
            .map(Self)
            .ok_or(ValidationError::ArrowCountOutOfRange(value))
    }

    /// The counter value.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Number of decimal digits the HUD uses to display the counter.
    ///
    /// Zero is displayed as a single digit.
    #[must_use]
    pub const fn digit_width(self) -> u32 {
        match self.0.checked_ilog10() {
            Some(log) => log + 1,
            None => 1,
        }
    }
}

impl TryFrom<i64> for ArrowCount {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArrowCount> for i64 {
    fn from(count: ArrowCount) -> Self {
        Self::from(count.0)
    }
}

impl std::fmt::Display for ArrowCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The first stage whose external command is actually invoked.
///
/// Stages before the resume point are assumed to have produced their
/// artifacts in an earlier run. Any requested value `<= 1` means "run
/// everything", including preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct ResumePoint(u32);

impl ResumePoint {
    /// Run the whole pipeline.
    pub const START: Self = Self(1);

    /// Build a resume point from a user-supplied step number.
    #[must_use]
    pub fn new(step: i64) -> Self {
        Self(u32::try_from(step.max(1)).unwrap_or(u32::MAX))
    }

    /// The normalized step number (always at least 1).
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether crosshair removal must run before the stages.
    #[must_use]
    pub const fn runs_preprocessing(self) -> bool {
        self.0 <= 1
    }

    /// Whether `step` is at or after the resume point and must execute.
    #[must_use]
    pub const fn executes(self, step: u32) -> bool {
        step >= self.0
    }
}

impl Default for ResumePoint {
    fn default() -> Self {
        Self::START
    }
}

impl From<i64> for ResumePoint {
    fn from(step: i64) -> Self {
        Self::new(step)
    }
}

impl From<ResumePoint> for i64 {
    fn from(point: ResumePoint) -> Self {
        Self::from(point.0)
    }
}

/// Configuration for one stitching run.
///
/// All parameters have defaults matching the stock capture setup
/// (1280x720 screenshots, zoomed bow view, arrow counter at zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// First stage to actually execute.
    pub resume_point: ResumePoint,

    /// Whether the captures were taken while holding ZR (bow drawn).
    pub holding_zr: bool,

    /// Arrow counter value visible in the captures.
    pub arrows: ArrowCount,

    /// Directory holding the crosshair masks. `None` means the directory
    /// containing the running executable.
    pub mask_dir: Option<PathBuf>,

    /// Directory receiving normalized frames and project files. External
    /// tools run with this as their working directory.
    pub work_dir: PathBuf,

    /// Whether to remove the crosshair and crop before stitching. When
    /// `false` the raw captures are stitched as-is.
    pub preprocess: bool,

    /// Neighbourhood radius in pixels used when repairing masked pixels.
    pub inpaint_radius: u32,

    /// Region of each capture kept after crosshair removal.
    pub crop: CropRect,

    /// Horizontal field of view handed to `pto_gen`, in degrees.
    pub field_of_view: u32,

    /// Thread count hint handed to `hugin_executor`.
    pub stitch_threads: u32,

    /// Fail as soon as a stage exits unsuccessfully. When `false`, a
    /// failing stage is only logged and the next stage runs anyway.
    pub check_exit_status: bool,
}

impl StitchConfig {
    /// Default for [`holding_zr`](Self::holding_zr).
    pub const DEFAULT_HOLDING_ZR: bool = true;
    /// Default for [`inpaint_radius`](Self::inpaint_radius).
    pub const DEFAULT_INPAINT_RADIUS: u32 = 6;
    /// Default for [`field_of_view`](Self::field_of_view).
    pub const DEFAULT_FIELD_OF_VIEW: u32 = 35;
    /// Default for [`stitch_threads`](Self::stitch_threads).
    pub const DEFAULT_STITCH_THREADS: u32 = 4;
    /// Default for [`work_dir`](Self::work_dir).
    pub const DEFAULT_WORK_DIR: &str = ".";
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            resume_point: ResumePoint::START,
            holding_zr: Self::DEFAULT_HOLDING_ZR,
            arrows: ArrowCount::ZERO,
            mask_dir: None,
            work_dir: PathBuf::from(Self::DEFAULT_WORK_DIR),
            preprocess: true,
            inpaint_radius: Self::DEFAULT_INPAINT_RADIUS,
            crop: CropRect::CAPTURE_VISIBLE,
            field_of_view: Self::DEFAULT_FIELD_OF_VIEW,
            stitch_threads: Self::DEFAULT_STITCH_THREADS,
            check_exit_status: true,
        }
    }
}

/// Invalid user input, detected before any processing starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The arrow counter cannot be displayed by the HUD.
    #[error("Number of arrows must be in range 0-999 (got {0})")]
    ArrowCountOutOfRange(i64),

    /// No captures were supplied.
    #[error("at least one input image is required")]
    NoInputs,
}

/// Errors raised while turning captures into normalized frames.
///
/// Any of these aborts the whole preprocessing phase; there is no
/// partial frame set.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    /// A capture could not be read from disk.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// The capture path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A capture could not be decoded as an image.
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        /// The capture path.
        path: PathBuf,
        /// Underlying decode error.
        source: image::ImageError,
    },

    /// The crosshair mask could not be read.
    #[error("failed to read crosshair mask {}: {source}", .path.display())]
    MaskRead {
        /// The mask path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The crosshair mask could not be decoded.
    #[error("failed to decode crosshair mask {}: {source}", .path.display())]
    MaskDecode {
        /// The mask path.
        path: PathBuf,
        /// Underlying decode error.
        source: image::ImageError,
    },

    /// A capture and the mask disagree on size.
    #[error("{} is {image} but the crosshair mask is {mask}", .path.display())]
    MaskDimensions {
        /// The capture path.
        path: PathBuf,
        /// Capture dimensions.
        image: Dimensions,
        /// Mask dimensions.
        mask: Dimensions,
    },

    /// A capture is too small for the crop rectangle.
    #[error("{} is {image}, too small to crop to {rect}", .path.display())]
    CropOutOfBounds {
        /// The capture path.
        path: PathBuf,
        /// Capture dimensions.
        image: Dimensions,
        /// The requested crop.
        rect: CropRect,
    },

    /// The output directory could not be created.
    #[error("failed to create output directory {}: {source}", .path.display())]
    CreateDir {
        /// The directory.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A normalized frame could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// The frame path.
        path: PathBuf,
        /// Underlying encode/I/O error.
        source: image::ImageError,
    },
}

/// Top-level error for a stitching run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Rejected user input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Crosshair removal failed.
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    /// An external stage failed.
    #[error(transparent)]
    Stage(#[from] crate::stage::StageError),

    /// The default mask directory could not be determined.
    #[error("failed to locate the crosshair mask directory: {0}")]
    MaskLocation(#[source] std::io::Error),

    /// An input path could not be made absolute.
    #[error("failed to resolve input path {}: {source}", .path.display())]
    InputPath {
        /// The input path as given.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
