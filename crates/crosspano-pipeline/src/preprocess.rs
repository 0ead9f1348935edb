//! Crosshair removal: raw captures in, normalized frames on disk out.
//!
//! Four phases, each run over the whole batch before the next starts:
//!
//! 1. Load: decode every capture, preserving input order.
//! 2. Remove crosshair: inpaint the pixels selected by the mask.
//! 3. Crop: keep the fixed visible rectangle.
//! 4. Save: write `nocross-cropped-<index>.png` for each frame.
//!
//! Any failure aborts the whole batch; later stages need a complete,
//! index-consistent frame set.

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{ImageFormat, RgbImage};

use crate::report::{Phase, PhaseReport};
use crate::types::{CropRect, Dimensions, PreprocessError, StitchConfig};

/// Name of the normalized frame for the capture at `index`.
///
/// A pure function of the index so that resumed runs can recompute the
/// names without touching the captures.
#[must_use]
pub fn frame_file_name(index: usize) -> String {
    format!("nocross-cropped-{index}.png")
}

/// Names of the normalized frames for `count` captures, in order.
#[must_use]
pub fn frame_file_names(count: usize) -> Vec<String> {
    (0..count).map(frame_file_name).collect()
}

/// Parameters for crosshair removal and cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessSettings {
    /// Inpainting neighbourhood radius in pixels.
    pub inpaint_radius: u32,
    /// Region kept after inpainting.
    pub crop: CropRect,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            inpaint_radius: StitchConfig::DEFAULT_INPAINT_RADIUS,
            crop: CropRect::CAPTURE_VISIBLE,
        }
    }
}

impl From<&StitchConfig> for PreprocessSettings {
    fn from(config: &StitchConfig) -> Self {
        Self {
            inpaint_radius: config.inpaint_radius,
            crop: config.crop,
        }
    }
}

/// Output of [`preprocess`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    /// Written frame names, relative to the output directory, in input
    /// order.
    pub frames: Vec<String>,
    /// Per-phase timings.
    pub phases: Vec<PhaseReport>,
}

/// Remove the crosshair from every capture and write normalized frames
/// into `out_dir`.
///
/// # Errors
///
/// Returns the first [`PreprocessError`] encountered; no frames are
/// reported on failure.
pub fn preprocess(
    captures: &[PathBuf],
    mask_path: &Path,
    out_dir: &Path,
    settings: &PreprocessSettings,
) -> Result<Preprocessed, PreprocessError> {
    let mut phases = Vec::with_capacity(4);

    let images = timed(&mut phases, Phase::Load, captures.len(), || {
        load_captures(captures)
    })?;

    let images = timed(&mut phases, Phase::RemoveCrosshair, images.len(), || {
        remove_crosshair(images, mask_path, settings.inpaint_radius)
    })?;

    let images = timed(&mut phases, Phase::Crop, images.len(), || {
        crop_all(images, settings.crop)
    })?;

    let frames = timed(&mut phases, Phase::Save, images.len(), || {
        write_frames(&images, out_dir)
    })?;

    Ok(Preprocessed { frames, phases })
}

/// A decoded capture and the path it came from, for error reporting.
type Loaded = (PathBuf, RgbImage);

/// Run `f` as one phase, logging start and end and recording its timing.
fn timed<T, E>(
    phases: &mut Vec<PhaseReport>,
    phase: Phase,
    images: usize,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    tracing::info!("{}...", phase.label());
    let started = Instant::now();
    let result = f()?;
    let duration = started.elapsed();
    tracing::info!("{} done ({:.3}s)", phase.label(), duration.as_secs_f64());
    phases.push(PhaseReport {
        phase,
        images,
        duration,
    });
    Ok(result)
}

/// Decode every capture into RGB8, preserving order.
fn load_captures(captures: &[PathBuf]) -> Result<Vec<Loaded>, PreprocessError> {
    captures
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path).map_err(|source| PreprocessError::Read {
                path: path.clone(),
                source,
            })?;
            let decoded =
                image::load_from_memory(&bytes).map_err(|source| PreprocessError::Decode {
                    path: path.clone(),
                    source,
                })?;
            Ok((path.clone(), decoded.to_rgb8()))
        })
        .collect()
}

fn remove_crosshair(
    images: Vec<Loaded>,
    mask_path: &Path,
    radius: u32,
) -> Result<Vec<Loaded>, PreprocessError> {
    let mask = crate::mask::load_mask(mask_path)?;
    let mask_dims = Dimensions::of(&mask);

    images
        .into_iter()
        .map(|(path, image)| {
            let image_dims = Dimensions::of(&image);
            if image_dims != mask_dims {
                return Err(PreprocessError::MaskDimensions {
                    path,
                    image: image_dims,
                    mask: mask_dims,
                });
            }
            let repaired = crate::inpaint::inpaint(&image, &mask, radius);
            Ok((path, repaired))
        })
        .collect()
}

/// Crop `image` to `rect`, or `None` if the rectangle does not fit.
#[must_use]
pub fn crop(image: &RgbImage, rect: CropRect) -> Option<RgbImage> {
    if !rect.fits_within(Dimensions::of(image)) {
        return None;
    }
    Some(image::imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image())
}

fn crop_all(images: Vec<Loaded>, rect: CropRect) -> Result<Vec<Loaded>, PreprocessError> {
    images
        .into_iter()
        .map(|(path, image)| match crop(&image, rect) {
            Some(cropped) => Ok((path, cropped)),
            None => Err(PreprocessError::CropOutOfBounds {
                image: Dimensions::of(&image),
                path,
                rect,
            }),
        })
        .collect()
}

/// Write each image as `nocross-cropped-<index>.png` inside `out_dir`.
///
/// Returns the written names relative to `out_dir`.
fn write_frames(images: &[Loaded], out_dir: &Path) -> Result<Vec<String>, PreprocessError> {
    images
        .iter()
        .enumerate()
        .map(|(index, (_, image))| {
            let name = frame_file_name(index);
            let path = out_dir.join(&name);
            image
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|source| PreprocessError::Write { path, source })?;
            Ok(name)
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Luma, Rgb};

    use super::*;

    fn small_settings() -> PreprocessSettings {
        PreprocessSettings {
            inpaint_radius: 2,
            crop: CropRect {
                x: 1,
                y: 2,
                width: 6,
                height: 4,
            },
        }
    }

    /// 8x8 gray capture with a white plus at (4, 4), and the matching mask.
    fn write_fixture(dir: &Path, captures: usize) -> (Vec<PathBuf>, PathBuf) {
        let mask = image::GrayImage::from_fn(8, 8, |x, y| {
            if x == 4 || y == 4 {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        let mask_path = dir.join("mask.png");
        mask.save(&mask_path).unwrap();

        let paths = (0..captures)
            .map(|i| {
                let shade = 50 + u8::try_from(i).unwrap() * 10;
                let img = RgbImage::from_fn(8, 8, |x, y| {
                    if x == 4 || y == 4 {
                        Rgb([255, 255, 255])
                    } else {
                        Rgb([shade, shade, shade])
                    }
                });
                let path = dir.join(format!("capture-{i}.png"));
                img.save(&path).unwrap();
                path
            })
            .collect();

        (paths, mask_path)
    }

    #[test]
    fn frame_names_are_indexed() {
        assert_eq!(frame_file_name(0), "nocross-cropped-0.png");
        assert_eq!(
            frame_file_names(3),
            vec![
                "nocross-cropped-0.png",
                "nocross-cropped-1.png",
                "nocross-cropped-2.png"
            ]
        );
        assert!(frame_file_names(0).is_empty());
    }

    #[test]
    fn crop_extracts_rectangle() {
        let img = RgbImage::from_fn(10, 10, |x, y| Rgb([x as u8, y as u8, 0]));
        let rect = CropRect {
            x: 2,
            y: 3,
            width: 4,
            height: 5,
        };
        let cropped = crop(&img, rect).unwrap();
        assert_eq!(Dimensions::of(&cropped), rect.dimensions());
        assert_eq!(*cropped.get_pixel(0, 0), Rgb([2, 3, 0]));
        assert_eq!(*cropped.get_pixel(3, 4), Rgb([5, 7, 0]));
    }

    #[test]
    fn crop_rejects_oversized_rectangle() {
        let img = RgbImage::new(1280, 700);
        assert!(crop(&img, CropRect::CAPTURE_VISIBLE).is_none());
    }

    #[test]
    fn preprocess_writes_one_frame_per_capture() {
        let dir = tempfile::tempdir().unwrap();
        let (captures, mask) = write_fixture(dir.path(), 3);
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let result = preprocess(&captures, &mask, &out, &small_settings()).unwrap();
        assert_eq!(result.frames, frame_file_names(3));
        assert_eq!(
            result.phases.iter().map(|p| p.phase).collect::<Vec<_>>(),
            vec![Phase::Load, Phase::RemoveCrosshair, Phase::Crop, Phase::Save]
        );

        for (i, name) in result.frames.iter().enumerate() {
            let frame = image::open(out.join(name)).unwrap().to_rgb8();
            assert_eq!(frame.dimensions(), (6, 4));
            // Crosshair gone: every pixel is the capture's background shade.
            let shade = 50 + u8::try_from(i).unwrap() * 10;
            for pixel in frame.pixels() {
                assert_eq!(*pixel, Rgb([shade, shade, shade]));
            }
        }
    }

    #[test]
    fn preprocess_leaves_captures_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (captures, mask) = write_fixture(dir.path(), 1);
        let before = std::fs::read(&captures[0]).unwrap();
        preprocess(&captures, &mask, dir.path(), &small_settings()).unwrap();
        assert_eq!(std::fs::read(&captures[0]).unwrap(), before);
    }

    #[test]
    fn undecodable_capture_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let (mut captures, mask) = write_fixture(dir.path(), 2);
        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, [0xFF, 0x00, 0x12]).unwrap();
        captures.insert(1, bogus.clone());

        let err = preprocess(&captures, &mask, dir.path(), &small_settings()).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode { ref path, .. } if *path == bogus));
        assert!(!dir.path().join(frame_file_name(0)).exists());
    }

    #[test]
    fn missing_capture_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let (_, mask) = write_fixture(dir.path(), 0);
        let captures = vec![dir.path().join("absent.png")];
        let err = preprocess(&captures, &mask, dir.path(), &small_settings()).unwrap_err();
        assert!(matches!(err, PreprocessError::Read { .. }));
    }

    #[test]
    fn missing_mask_surfaces_during_preprocessing() {
        let dir = tempfile::tempdir().unwrap();
        let (captures, _) = write_fixture(dir.path(), 1);
        let err = preprocess(
            &captures,
            &dir.path().join("no-mask.png"),
            dir.path(),
            &small_settings(),
        )
        .unwrap_err();
        assert!(matches!(err, PreprocessError::MaskRead { .. }));
    }

    #[test]
    fn mask_size_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (captures, _) = write_fixture(dir.path(), 1);
        let mask_path = dir.path().join("wide-mask.png");
        image::GrayImage::new(16, 8).save(&mask_path).unwrap();

        let err = preprocess(&captures, &mask_path, dir.path(), &small_settings()).unwrap_err();
        assert!(matches!(err, PreprocessError::MaskDimensions { .. }));
    }

    #[test]
    fn undersized_capture_cannot_be_cropped() {
        let dir = tempfile::tempdir().unwrap();
        let (captures, mask) = write_fixture(dir.path(), 1);
        let settings = PreprocessSettings {
            crop: CropRect::CAPTURE_VISIBLE,
            ..small_settings()
        };
        let err = preprocess(&captures, &mask, dir.path(), &settings).unwrap_err();
        assert!(matches!(err, PreprocessError::CropOutOfBounds { .. }));
    }

    #[test]
    fn unwritable_output_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let (captures, mask) = write_fixture(dir.path(), 1);
        let out = dir.path().join("missing-dir");
        let err = preprocess(&captures, &mask, &out, &small_settings()).unwrap_err();
        assert!(matches!(err, PreprocessError::Write { .. }));
    }
}
