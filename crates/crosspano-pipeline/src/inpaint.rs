//! Region inpainting for crosshair removal.
//!
//! Masked pixels are filled from the outside in: on every pass, the
//! masked pixels that touch at least one known pixel (the frontier,
//! found with [`imageproc::morphology::dilate`]) take the
//! inverse-square-distance weighted mean of the known pixels within
//! `radius`. The frontier then becomes known and the next pass proceeds
//! one pixel further into the hole.
//!
//! Frontier values are computed from the known set before any of them
//! are written, so the result does not depend on scan order.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;

const KNOWN: u8 = 255;

/// Repair the pixels of `image` selected by `mask`.
///
/// A pixel is repaired when the corresponding mask value is non-zero.
/// Mask pixels outside the image bounds are ignored, as are image pixels
/// outside the mask. `radius` is the sampling neighbourhood in pixels;
/// the immediate 8-neighbourhood is always sampled so that a radius of
/// zero still makes progress.
///
/// If the mask covers the entire image there is nothing to sample from
/// and the image is returned unchanged.
#[must_use = "returns the repaired image"]
pub fn inpaint(image: &RgbImage, mask: &GrayImage, radius: u32) -> RgbImage {
    let (w, h) = image.dimensions();
    let mut known = GrayImage::from_fn(w, h, |x, y| {
        let masked = mask
            .get_pixel_checked(x, y)
            .is_some_and(|p| p.0[0] != 0);
        if masked { Luma([0]) } else { Luma([KNOWN]) }
    });

    let mut output = image.clone();
    let reach = i64::from(radius.max(1));
    let reach_sq = reach * reach;

    loop {
        let grown = imageproc::morphology::dilate(&known, Norm::LInf, 1);
        let frontier: Vec<(u32, u32)> = known
            .enumerate_pixels()
            .filter(|&(x, y, p)| p.0[0] == 0 && grown.get_pixel(x, y).0[0] != 0)
            .map(|(x, y, _)| (x, y))
            .collect();

        if frontier.is_empty() {
            break;
        }

        let filled: Vec<Rgb<u8>> = frontier
            .iter()
            .map(|&(x, y)| weighted_mean(&output, &known, x, y, reach, reach_sq))
            .collect();

        for (&(x, y), value) in frontier.iter().zip(filled) {
            output.put_pixel(x, y, value);
            known.put_pixel(x, y, Luma([KNOWN]));
        }
    }

    output
}

/// Inverse-square-distance weighted mean of the known pixels around
/// `(cx, cy)`.
///
/// Callers guarantee at least one known 8-neighbour, so the weight sum
/// is never zero for frontier pixels.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn weighted_mean(
    image: &RgbImage,
    known: &GrayImage,
    cx: u32,
    cy: u32,
    reach: i64,
    reach_sq: i64,
) -> Rgb<u8> {
    let (w, h) = (i64::from(image.width()), i64::from(image.height()));
    let (cx, cy) = (i64::from(cx), i64::from(cy));

    let mut sum = [0.0_f64; 3];
    let mut weight_sum = 0.0_f64;

    for y in (cy - reach).max(0)..=(cy + reach).min(h - 1) {
        for x in (cx - reach).max(0)..=(cx + reach).min(w - 1) {
            let (dx, dy) = (x - cx, y - cy);
            let dist_sq = dx * dx + dy * dy;
            let adjacent = dx.abs() <= 1 && dy.abs() <= 1;
            if dist_sq == 0 || (dist_sq > reach_sq && !adjacent) {
                continue;
            }
            // In-bounds by construction of the loop ranges.
            let (px, py) = (x as u32, y as u32);
            if known.get_pixel(px, py).0[0] != KNOWN {
                continue;
            }
            let weight = 1.0 / dist_sq as f64;
            let pixel = image.get_pixel(px, py).0;
            for (acc, &channel) in sum.iter_mut().zip(pixel.iter()) {
                *acc += weight * f64::from(channel);
            }
            weight_sum += weight;
        }
    }

    if weight_sum <= 0.0 {
        return *image.get_pixel(cx as u32, cy as u32);
    }

    Rgb(sum.map(|s| (s / weight_sum).round().clamp(0.0, 255.0) as u8))
}
