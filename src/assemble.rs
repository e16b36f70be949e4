//! Recomposes one output variant from four partition results.
//!
//! Assembly is all-or-nothing per variant: every partition must have
//! succeeded and produced the variant. Quadrants are stitched as
//! `(0 | 1)` over `(2 | 3)`.

use crate::dispatcher::DispatchResult;
use crate::error::AssemblyError;
use crate::image::{Image, ShapeError};
use crate::partition::PARTITION_COUNT;

/// Rebuild `variant` from dispatch results indexed by partition.
///
/// # Errors
///
/// [`AssemblyError::MissingPartitions`] lists every index that failed or
/// lacks `variant`. [`AssemblyError::ShapeMismatch`] is returned when the
/// quadrants do not tile.
pub fn assemble(
    results: &[DispatchResult; PARTITION_COUNT],
    variant: &str,
) -> Result<Image, AssemblyError> {
    let mut quadrants: [Option<&Image>; PARTITION_COUNT] = [None; PARTITION_COUNT];
    let mut missing = Vec::new();

    for (index, result) in results.iter().enumerate() {
        match result.output().and_then(|out| out.variants.get(variant)) {
            Some(image) => quadrants[index] = Some(image),
            None => missing.push(index),
        }
    }

    match quadrants {
        [Some(tl), Some(tr), Some(bl), Some(br)] => assemble_quadrants(variant, [tl, tr, bl, br]),
        _ => Err(AssemblyError::MissingPartitions {
            variant: variant.to_string(),
            indices: missing,
        }),
    }
}

/// Stitch four quadrants given in index order.
pub fn assemble_quadrants(
    variant: &str,
    [top_left, top_right, bottom_left, bottom_right]: [&Image; PARTITION_COUNT],
) -> Result<Image, AssemblyError> {
    let mismatch = |detail: String| AssemblyError::ShapeMismatch {
        variant: variant.to_string(),
        detail,
    };

    // Row concatenation alone would accept columns that do not line up.
    if top_left.width() != bottom_left.width() {
        return Err(mismatch(format!(
            "left column widths differ: {} vs {}",
            top_left.width(),
            bottom_left.width()
        )));
    }
    if top_right.width() != bottom_right.width() {
        return Err(mismatch(format!(
            "right column widths differ: {} vs {}",
            top_right.width(),
            bottom_right.width()
        )));
    }

    let stitch = |result: Result<Image, ShapeError>, what: &str| {
        result.map_err(|ShapeError(detail)| mismatch(format!("{}: {}", what, detail)))
    };
    let top = stitch(Image::hconcat(top_left, top_right), "top row")?;
    let bottom = stitch(Image::hconcat(bottom_left, bottom_right), "bottom row")?;
    stitch(Image::vconcat(&top, &bottom), "rows")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use proptest::prelude::*;

    use crate::dispatcher::PartitionOutput;
    use crate::error::QuadwireError;
    use crate::partition::partition;
    use crate::transform::VariantSet;
    use crate::transport::Endpoint;

    fn sample(width: u32, height: u32, channels: u32) -> Image {
        Image::from_fn(width, height, channels, |x, y, c| {
            (x.wrapping_mul(31) ^ y.wrapping_mul(17) ^ c.wrapping_mul(5)) as u8
        })
    }

    fn success(index: usize, variants: VariantSet) -> DispatchResult {
        DispatchResult {
            index,
            endpoint: Endpoint::new("127.0.0.1", 7000 + index as u16),
            outcome: Ok(PartitionOutput {
                variants,
                transform_time: Duration::ZERO,
            }),
            elapsed: Duration::ZERO,
        }
    }

    fn failure(index: usize) -> DispatchResult {
        DispatchResult {
            index,
            endpoint: Endpoint::new("127.0.0.1", 7000 + index as u16),
            outcome: Err(QuadwireError::Protocol("unreachable".into())),
            elapsed: Duration::ZERO,
        }
    }

    /// Identity results for every partition of `image`.
    fn identity_results(image: &Image) -> [DispatchResult; PARTITION_COUNT] {
        partition(image)
            .unwrap()
            .map(|p| success(p.index(), VariantSet::single("identity", p.image)))
    }

    #[test]
    fn test_even_round_trip() {
        let image = sample(64, 48, 3);
        assert_eq!(assemble(&identity_results(&image), "identity").unwrap(), image);
    }

    #[test]
    fn test_odd_round_trip() {
        let image = sample(257, 255, 1);
        assert_eq!(assemble(&identity_results(&image), "identity").unwrap(), image);
    }

    #[test]
    fn test_missing_partition_named() {
        let image = sample(8, 8, 1);
        let mut results = identity_results(&image);
        results[2] = failure(2);

        let err = assemble(&results, "identity").unwrap_err();
        match err {
            AssemblyError::MissingPartitions { variant, indices } => {
                assert_eq!(variant, "identity");
                assert_eq!(indices, vec![2]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unknown_variant_names_all_indices() {
        let image = sample(8, 8, 1);
        let err = assemble(&identity_results(&image), "gray").unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::MissingPartitions { ref indices, .. } if *indices == vec![0, 1, 2, 3]
        ));
    }

    #[test]
    fn test_variant_missing_from_one_partition() {
        let image = sample(8, 8, 1);
        let mut results = identity_results(&image);
        let quadrant = results[3].output().unwrap().variants.get("identity").unwrap().clone();
        results[3] = success(3, VariantSet::single("other", quadrant));

        let err = assemble(&results, "identity").unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::MissingPartitions { ref indices, .. } if *indices == vec![3]
        ));
    }

    #[test]
    fn test_column_width_mismatch() {
        let a = sample(3, 2, 1);
        let b = sample(5, 2, 1);
        let c = sample(4, 2, 1);
        let d = sample(4, 2, 1);
        // Rows are both 8 wide but the columns do not line up.
        let err = assemble_quadrants("v", [&a, &b, &c, &d]).unwrap_err();
        assert!(matches!(err, AssemblyError::ShapeMismatch { ref detail, .. } if detail.contains("left column")));
    }

    #[test]
    fn test_row_height_mismatch() {
        let a = sample(2, 2, 1);
        let b = sample(2, 3, 1);
        let err = assemble_quadrants("v", [&a, &b, &a, &a]).unwrap_err();
        assert!(matches!(err, AssemblyError::ShapeMismatch { ref detail, .. } if detail.contains("top row")));
    }

    #[test]
    fn test_channel_mismatch() {
        let a = sample(2, 2, 1);
        let b = sample(2, 2, 3);
        let err = assemble_quadrants("v", [&a, &a, &b, &b]).unwrap_err();
        assert!(matches!(err, AssemblyError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_row_width_overflow_is_a_shape_mismatch() {
        // Zero-height strips pass every length check but their widths sum past u32.
        let wide = Image::new(u32::MAX, 0, 1, vec![]).unwrap();
        let narrow = Image::new(1, 0, 1, vec![]).unwrap();
        let err = assemble_quadrants("v", [&wide, &narrow, &wide, &narrow]).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::ShapeMismatch { ref detail, .. } if detail == "top row: width overflows u32"
        ));

        let results = [
            success(0, VariantSet::single("v", wide.clone())),
            success(1, VariantSet::single("v", narrow.clone())),
            success(2, VariantSet::single("v", wide)),
            success(3, VariantSet::single("v", narrow)),
        ];
        assert!(matches!(
            assemble(&results, "v"),
            Err(AssemblyError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_uniformly_resized_quadrants_assemble() {
        // A transform may change dimensions as long as the grid stays consistent.
        let q = sample(2, 3, 1);
        let out = assemble_quadrants("thumb", [&q, &q, &q, &q]).unwrap();
        assert_eq!((out.width(), out.height()), (4, 6));
    }

    proptest! {
        #[test]
        fn prop_partition_assemble_round_trip(
            width in 2u32..48,
            height in 2u32..48,
            channels in 1u32..5,
        ) {
            let image = sample(width, height, channels);
            let rebuilt = assemble(&identity_results(&image), "identity").unwrap();
            prop_assert_eq!(rebuilt, image);
        }
    }
}
