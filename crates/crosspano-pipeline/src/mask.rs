//! Crosshair mask selection and loading.
//!
//! The reticle overlay looks different depending on whether ZR is held
//! (bow drawn) and how many digits the arrow counter next to it takes
//! up. One mask image exists per combination, plus a dedicated mask for
//! "holding ZR with zero arrows" where the counter is drawn differently.
//!
//! Selection is a pure name computation; the file is only touched when
//! [`load_mask`] reads it during preprocessing.

use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::types::{ArrowCount, PreprocessError};

/// Mask used when holding ZR with an empty quiver.
pub const ZERO_ARROWS_MASK: &str = "crosshair-mask-zr-yes-arrows-0.png";

/// File name of the mask matching the capture parameters.
///
/// The generic pattern is `crosshair-mask-zr-<yes|no>-digits-<d>.png`
/// where `d` is the displayed digit width of the arrow counter.
/// Holding ZR with zero arrows selects [`ZERO_ARROWS_MASK`] instead.
#[must_use]
pub fn mask_file_name(holding_zr: bool, arrows: ArrowCount) -> String {
    if holding_zr && arrows == ArrowCount::ZERO {
        return ZERO_ARROWS_MASK.to_owned();
    }

    let zr = if holding_zr { "yes" } else { "no" };
    format!("crosshair-mask-zr-{zr}-digits-{}.png", arrows.digit_width())
}

/// Full path of the mask matching the capture parameters, inside `dir`.
///
/// No existence check is performed.
#[must_use]
pub fn select_mask(dir: &Path, holding_zr: bool, arrows: ArrowCount) -> PathBuf {
    dir.join(mask_file_name(holding_zr, arrows))
}

/// Directory containing the running executable.
///
/// Masks ship next to the binary, so resolving against this directory
/// lets the tool run from any working directory.
///
/// # Errors
///
/// Returns an I/O error if the executable path cannot be determined or
/// canonicalized.
pub fn install_dir() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?.canonicalize()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "executable path has no parent directory",
        )
    })
}

/// Read a mask image and keep its blue channel.
///
/// Non-zero values in the returned image mark crosshair pixels.
///
/// # Errors
///
/// Returns [`PreprocessError::MaskRead`] if the file cannot be read and
/// [`PreprocessError::MaskDecode`] if it is not a decodable image.
pub fn load_mask(path: &Path) -> Result<GrayImage, PreprocessError> {
    let bytes = std::fs::read(path).map_err(|source| PreprocessError::MaskRead {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded =
        image::load_from_memory(&bytes).map_err(|source| PreprocessError::MaskDecode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(blue_channel(&decoded))
}

/// Extract the blue channel, which is the first channel of the BGR
/// layout the masks are authored in. Gray masks yield their luma.
fn blue_channel(image: &image::DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        image::Luma([rgb.get_pixel(x, y).0[2]])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn arrows(n: i64) -> ArrowCount {
        ArrowCount::new(n).unwrap()
    }

    #[test]
    fn zero_arrows_holding_zr_uses_override() {
        assert_eq!(mask_file_name(true, arrows(0)), ZERO_ARROWS_MASK);
    }

    #[test]
    fn zero_arrows_not_holding_zr_uses_one_digit() {
        assert_eq!(
            mask_file_name(false, arrows(0)),
            "crosshair-mask-zr-no-digits-1.png"
        );
    }

    #[test]
    fn digit_widths_select_generic_masks() {
        assert_eq!(
            mask_file_name(true, arrows(7)),
            "crosshair-mask-zr-yes-digits-1.png"
        );
        assert_eq!(
            mask_file_name(true, arrows(42)),
            "crosshair-mask-zr-yes-digits-2.png"
        );
        assert_eq!(
            mask_file_name(false, arrows(100)),
            "crosshair-mask-zr-no-digits-3.png"
        );
    }

    #[test]
    fn select_mask_joins_directory() {
        let path = select_mask(Path::new("/opt/crosspano"), false, arrows(5));
        assert_eq!(
            path,
            PathBuf::from("/opt/crosspano/crosshair-mask-zr-no-digits-1.png")
        );
    }

    #[test]
    fn install_dir_is_absolute() {
        let dir = install_dir().unwrap();
        assert!(dir.is_absolute());
    }

    #[test]
    fn load_mask_missing_file() {
        let result = load_mask(Path::new("/nonexistent/crosshair-mask.png"));
        assert!(matches!(result, Err(PreprocessError::MaskRead { .. })));
    }

    #[test]
    fn load_mask_keeps_blue_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let img = image::RgbImage::from_fn(3, 2, |x, _| {
            if x == 1 {
                image::Rgb([0, 0, 255])
            } else {
                image::Rgb([255, 255, 0])
            }
        });
        img.save(&path).unwrap();

        let mask = load_mask(&path).unwrap();
        assert_eq!(mask.dimensions(), (3, 2));
        assert_eq!(mask.get_pixel(1, 0).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(mask.get_pixel(2, 1).0[0], 0);
    }

    #[test]
    fn load_mask_gray_keeps_luma() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let img = GrayImage::from_fn(2, 1, |x, _| image::Luma([if x == 0 { 200 } else { 0 }]));
        img.save(&path).unwrap();

        let mask = load_mask(&path).unwrap();
        assert_eq!(mask.get_pixel(0, 0).0[0], 200);
        assert_eq!(mask.get_pixel(1, 0).0[0], 0);
    }
}
