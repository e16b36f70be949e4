//! Splits an image into a fixed 2x2 grid of quadrants.
//!
//! The split point is `(width / 2, height / 2)` with floor division, so an
//! odd trailing column lands in the right-hand quadrants and an odd
//! trailing row in the bottom quadrants.
//!
//! ```text
//!            mid_x
//!   ┌─────────┬──────────┐
//!   │ 0 (TL)  │ 1 (TR)   │
//!   ├─────────┼──────────┤ mid_y
//!   │ 2 (BL)  │ 3 (BR)   │
//!   └─────────┴──────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{QuadwireError, Result};
use crate::image::Image;

/// Number of partitions per request.
pub const PARTITION_COUNT: usize = 4;

/// Position of a partition in the 2x2 grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quadrant {
    /// Index 0.
    TopLeft,
    /// Index 1.
    TopRight,
    /// Index 2.
    BottomLeft,
    /// Index 3.
    BottomRight,
}

impl Quadrant {
    /// All quadrants in index order.
    pub const ALL: [Quadrant; PARTITION_COUNT] = [
        Quadrant::TopLeft,
        Quadrant::TopRight,
        Quadrant::BottomLeft,
        Quadrant::BottomRight,
    ];

    /// Grid index (0..=3).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Quadrant::TopLeft => 0,
            Quadrant::TopRight => 1,
            Quadrant::BottomLeft => 2,
            Quadrant::BottomRight => 3,
        }
    }

    /// Quadrant for a grid index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// True for the two right-hand quadrants.
    #[inline]
    pub fn is_right(self) -> bool {
        matches!(self, Quadrant::TopRight | Quadrant::BottomRight)
    }

    /// True for the two bottom quadrants.
    #[inline]
    pub fn is_bottom(self) -> bool {
        matches!(self, Quadrant::BottomLeft | Quadrant::BottomRight)
    }
}

impl std::fmt::Display for Quadrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Quadrant::TopLeft => "top-left",
            Quadrant::TopRight => "top-right",
            Quadrant::BottomLeft => "bottom-left",
            Quadrant::BottomRight => "bottom-right",
        };
        f.write_str(name)
    }
}

/// Offset of a partition's top-left pixel within the source image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// Column offset.
    pub x: u32,
    /// Row offset.
    pub y: u32,
}

/// One quadrant of a source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Grid position.
    pub quadrant: Quadrant,
    /// Offset within the source image.
    pub origin: Origin,
    /// Quadrant pixels.
    pub image: Image,
}

impl Partition {
    /// Grid index (0..=3).
    #[inline]
    pub fn index(&self) -> usize {
        self.quadrant.index()
    }
}

/// Split `image` into four non-empty quadrants in index order.
///
/// # Errors
///
/// Returns [`QuadwireError::EmptyImage`] when either dimension is below 2,
/// since a zero-width or zero-height quadrant would result.
pub fn partition(image: &Image) -> Result<[Partition; PARTITION_COUNT]> {
    let (width, height) = (image.width(), image.height());
    if width < 2 || height < 2 {
        return Err(QuadwireError::EmptyImage { width, height });
    }

    let mid_x = width / 2;
    let mid_y = height / 2;

    let cut = |quadrant: Quadrant| -> Result<Partition> {
        let (x, w) = if quadrant.is_right() {
            (mid_x, width - mid_x)
        } else {
            (0, mid_x)
        };
        let (y, h) = if quadrant.is_bottom() {
            (mid_y, height - mid_y)
        } else {
            (0, mid_y)
        };
        Ok(Partition {
            quadrant,
            origin: Origin { x, y },
            image: image.crop(x, y, w, h)?,
        })
    };

    Ok([
        cut(Quadrant::TopLeft)?,
        cut(Quadrant::TopRight)?,
        cut(Quadrant::BottomLeft)?,
        cut(Quadrant::BottomRight)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(width: u32, height: u32, channels: u32) -> Image {
        Image::from_fn(width, height, channels, |x, y, c| {
            (x * 3 + y * 5 + c) as u8
        })
    }

    #[test]
    fn test_quadrant_index_roundtrip() {
        for (i, q) in Quadrant::ALL.iter().enumerate() {
            assert_eq!(q.index(), i);
            assert_eq!(Quadrant::from_index(i), Some(*q));
        }
        assert_eq!(Quadrant::from_index(4), None);
    }

    #[test]
    fn test_even_split() {
        let parts = partition(&sample(256, 256, 3)).unwrap();
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.index(), i);
            assert_eq!((part.image.width(), part.image.height()), (128, 128));
            assert_eq!(part.image.channels(), 3);
        }
        assert_eq!(parts[1].origin, Origin { x: 128, y: 0 });
        assert_eq!(parts[2].origin, Origin { x: 0, y: 128 });
        assert_eq!(parts[3].origin, Origin { x: 128, y: 128 });
    }

    #[test]
    fn test_odd_split_gives_extra_row_and_column_to_bottom_right() {
        let parts = partition(&sample(257, 255, 1)).unwrap();
        let dims: Vec<(u32, u32)> = parts
            .iter()
            .map(|p| (p.image.width(), p.image.height()))
            .collect();
        assert_eq!(dims, vec![(128, 127), (129, 127), (128, 128), (129, 128)]);
    }

    #[test]
    fn test_partition_pixels_match_source() {
        let image = sample(9, 7, 2);
        let parts = partition(&image).unwrap();
        for part in &parts {
            for y in 0..part.image.height() {
                for x in 0..part.image.width() {
                    assert_eq!(
                        part.image.pixel(x, y),
                        image.pixel(x + part.origin.x, y + part.origin.y)
                    );
                }
            }
        }
    }

    #[test]
    fn test_smallest_splittable_image() {
        let parts = partition(&sample(2, 2, 1)).unwrap();
        assert!(parts.iter().all(|p| p.image.width() == 1 && p.image.height() == 1));
    }

    #[test]
    fn test_empty_and_degenerate_images_rejected() {
        for (w, h) in [(0, 0), (0, 4), (4, 0), (1, 8), (8, 1)] {
            let image = Image::new(w, h, 1, vec![0; (w * h) as usize]).unwrap();
            let err = partition(&image).unwrap_err();
            assert!(
                matches!(err, QuadwireError::EmptyImage { width, height } if width == w && height == h)
            );
        }
    }

    #[test]
    fn test_partition_is_deterministic() {
        let image = sample(33, 17, 3);
        assert_eq!(partition(&image).unwrap(), partition(&image).unwrap());
    }
}
