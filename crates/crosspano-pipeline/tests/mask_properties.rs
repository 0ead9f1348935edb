//! Property tests for crosshair mask selection.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crosspano_pipeline::mask::{ZERO_ARROWS_MASK, mask_file_name};
use crosspano_pipeline::{ArrowCount, ValidationError};
use proptest::prelude::*;

/// Reference digit width: 1 for zero, floor(log10(n)) + 1 otherwise.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn reference_digits(n: i64) -> u32 {
    if n == 0 {
        1
    } else {
        (n as f64).log10().floor() as u32 + 1
    }
}

proptest! {
    /// The digit component matches the displayed width, and the override
    /// applies exactly when holding ZR with zero arrows.
    #[test]
    fn mask_name_follows_digit_width(n in 0i64..=999, holding_zr in any::<bool>()) {
        let arrows = ArrowCount::new(n).expect("in range");
        let name = mask_file_name(holding_zr, arrows);

        if holding_zr && n == 0 {
            prop_assert_eq!(name, ZERO_ARROWS_MASK);
        } else {
            let zr = if holding_zr { "yes" } else { "no" };
            let expected = format!("crosshair-mask-zr-{zr}-digits-{}.png", reference_digits(n));
            prop_assert_eq!(name, expected);
        }
    }

    /// Every value outside 0..=999 is a validation error.
    #[test]
    fn out_of_range_counts_rejected(
        n in prop_oneof![i64::MIN..0i64, 1000i64..=i64::MAX]
    ) {
        prop_assert_eq!(ArrowCount::new(n), Err(ValidationError::ArrowCountOutOfRange(n)));
    }
}
