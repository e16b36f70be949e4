//! Row-major interleaved image buffer.
//!
//! The invariant `data.len() == width * height * channels` holds for every
//! constructed [`Image`], including ones decoded off the wire.
//!
//! # Example
//!
//! ```
//! use quadwire::Image;
//!
//! let image = Image::from_fn(4, 2, 3, |x, y, c| (x + y + c) as u8);
//! assert_eq!(image.data().len(), 4 * 2 * 3);
//! assert_eq!(image.pixel(1, 1), Some(&[2u8, 3, 4][..]));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{QuadwireError, Result};

/// Dimensions of two images cannot be concatenated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ShapeError(pub String);

/// An image: width, height, channel count and a row-major pixel buffer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ImageRepr")]
pub struct Image {
    width: u32,
    height: u32,
    channels: u32,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

/// Unvalidated wire shape of [`Image`].
#[derive(Deserialize)]
struct ImageRepr {
    width: u32,
    height: u32,
    channels: u32,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

impl TryFrom<ImageRepr> for Image {
    type Error = QuadwireError;

    fn try_from(repr: ImageRepr) -> Result<Self> {
        Image::new(repr.width, repr.height, repr.channels, repr.data)
    }
}

fn buffer_len(width: u32, height: u32, channels: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels as usize)
}

/// Sample count for a shape, or `InvalidImage` if the shape is unusable.
fn checked_len(width: u32, height: u32, channels: u32) -> Result<usize> {
    if channels == 0 {
        return Err(QuadwireError::InvalidImage(
            "channel count must be at least 1".to_string(),
        ));
    }
    buffer_len(width, height, channels).ok_or_else(|| {
        QuadwireError::InvalidImage(format!(
            "{}x{}x{} overflows the address space",
            width, height, channels
        ))
    })
}

impl Image {
    /// Create an image, checking the buffer length against the shape.
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Result<Self> {
        let expected = checked_len(width, height, channels)?;
        if data.len() != expected {
            return Err(QuadwireError::InvalidImage(format!(
                "buffer holds {} bytes, {}x{}x{} needs {}",
                data.len(),
                width,
                height,
                channels,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Build an image by evaluating `f(x, y, channel)` for every sample.
    pub fn try_from_fn<F>(width: u32, height: u32, channels: u32, mut f: F) -> Result<Self>
    where
        F: FnMut(u32, u32, u32) -> u8,
    {
        let len = checked_len(width, height, channels)?;
        let mut data = Vec::with_capacity(len);
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    data.push(f(x, y, c));
                }
            }
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Infallible [`Image::try_from_fn`] for fixtures and demos with
    /// known-good shapes.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is zero or the buffer size overflows `usize`.
    pub fn from_fn<F>(width: u32, height: u32, channels: u32, f: F) -> Self
    where
        F: FnMut(u32, u32, u32) -> u8,
    {
        match Self::try_from_fn(width, height, channels, f) {
            Ok(image) => image,
            Err(e) => panic!("{}", e),
        }
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel.
    #[inline]
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Raw row-major samples.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the image, returning its buffer.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// True if either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes per row.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Samples of row `y`.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let stride = self.row_stride();
        let start = y as usize * stride;
        Some(&self.data[start..start + stride])
    }

    /// Samples of pixel `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width {
            return None;
        }
        let channels = self.channels as usize;
        let start = x as usize * channels;
        self.row(y).map(|row| &row[start..start + channels])
    }

    /// Copy out the rectangle at `(x, y)` of size `width x height`.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Image> {
        let fits_x = x.checked_add(width).is_some_and(|end| end <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|end| end <= self.height);
        if !fits_x || !fits_y {
            return Err(QuadwireError::InvalidImage(format!(
                "crop {}x{} at ({}, {}) exceeds {}x{}",
                width, height, x, y, self.width, self.height
            )));
        }

        let channels = self.channels as usize;
        let start = x as usize * channels;
        let len = width as usize * channels;
        let mut data = Vec::with_capacity(len * height as usize);
        for row in y..y + height {
            let stride = self.row_stride();
            let offset = row as usize * stride + start;
            data.extend_from_slice(&self.data[offset..offset + len]);
        }
        Image::new(width, height, self.channels, data)
    }

    /// Apply `f` to every sample, keeping the shape.
    pub fn map_samples<F>(&self, f: F) -> Image
    where
        F: Fn(u8) -> u8,
    {
        Self {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Place `right` to the right of `left`.
    pub fn hconcat(left: &Image, right: &Image) -> std::result::Result<Image, ShapeError> {
        if left.height != right.height {
            return Err(ShapeError(format!(
                "heights differ: {} vs {}",
                left.height, right.height
            )));
        }
        if left.channels != right.channels {
            return Err(ShapeError(format!(
                "channel counts differ: {} vs {}",
                left.channels, right.channels
            )));
        }

        let width = left
            .width
            .checked_add(right.width)
            .ok_or_else(|| ShapeError("width overflows u32".to_string()))?;
        let mut data = Vec::with_capacity(left.data.len() + right.data.len());
        for y in 0..left.height {
            let (Some(l), Some(r)) = (left.row(y), right.row(y)) else {
                break;
            };
            data.extend_from_slice(l);
            data.extend_from_slice(r);
        }
        Ok(Self {
            width,
            height: left.height,
            channels: left.channels,
            data,
        })
    }

    /// Place `bottom` below `top`.
    pub fn vconcat(top: &Image, bottom: &Image) -> std::result::Result<Image, ShapeError> {
        if top.width != bottom.width {
            return Err(ShapeError(format!(
                "widths differ: {} vs {}",
                top.width, bottom.width
            )));
        }
        if top.channels != bottom.channels {
            return Err(ShapeError(format!(
                "channel counts differ: {} vs {}",
                top.channels, bottom.channels
            )));
        }

        let height = top
            .height
            .checked_add(bottom.height)
            .ok_or_else(|| ShapeError("height overflows u32".to_string()))?;

        let mut data = Vec::with_capacity(top.data.len() + bottom.data.len());
        data.extend_from_slice(&top.data);
        data.extend_from_slice(&bottom.data);
        Ok(Self {
            width: top.width,
            height,
            channels: top.channels,
            data,
        })
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MsgPackCodec;

    fn gradient(width: u32, height: u32, channels: u32) -> Image {
        Image::from_fn(width, height, channels, |x, y, c| {
            (x.wrapping_mul(7) ^ y.wrapping_mul(13) ^ c) as u8
        })
    }

    #[test]
    fn test_new_validates_length() {
        assert!(Image::new(2, 2, 3, vec![0; 12]).is_ok());
        let err = Image::new(2, 2, 3, vec![0; 11]).unwrap_err();
        assert!(err.to_string().contains("needs 12"));
    }

    #[test]
    fn test_new_rejects_zero_channels() {
        assert!(Image::new(2, 2, 0, vec![]).is_err());
    }

    #[test]
    fn test_zero_sized_image_is_valid_but_empty() {
        let image = Image::new(0, 5, 1, vec![]).unwrap();
        assert!(image.is_empty());
    }

    #[test]
    fn test_pixel_and_row_access() {
        let image = gradient(3, 2, 2);
        assert_eq!(image.row(1).unwrap().len(), 6);
        assert_eq!(image.pixel(2, 1).unwrap(), &image.data()[10..12]);
        assert!(image.pixel(3, 0).is_none());
        assert!(image.row(2).is_none());
    }

    #[test]
    fn test_crop_copies_rectangle() {
        let image = gradient(5, 4, 1);
        let cropped = image.crop(1, 2, 3, 2).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (3, 2));
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(cropped.pixel(x, y), image.pixel(x + 1, y + 2));
            }
        }
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let image = gradient(4, 4, 1);
        assert!(image.crop(2, 0, 3, 1).is_err());
        assert!(image.crop(0, u32::MAX, 1, 2).is_err());
    }

    #[test]
    fn test_hconcat_vconcat_rebuild_source() {
        let image = gradient(6, 4, 3);
        let top = Image::hconcat(&image.crop(0, 0, 2, 1).unwrap(), &image.crop(2, 0, 4, 1).unwrap())
            .unwrap();
        let bottom =
            Image::hconcat(&image.crop(0, 1, 2, 3).unwrap(), &image.crop(2, 1, 4, 3).unwrap())
                .unwrap();
        assert_eq!(Image::vconcat(&top, &bottom).unwrap(), image);
    }

    #[test]
    fn test_hconcat_rejects_height_mismatch() {
        let err = Image::hconcat(&gradient(2, 2, 1), &gradient(2, 3, 1)).unwrap_err();
        assert!(err.0.contains("heights differ"));
    }

    #[test]
    fn test_vconcat_rejects_channel_mismatch() {
        let err = Image::vconcat(&gradient(2, 2, 1), &gradient(2, 2, 3)).unwrap_err();
        assert!(err.0.contains("channel counts differ"));
    }

    #[test]
    fn test_vconcat_rejects_height_overflow() {
        let top = Image::new(0, u32::MAX, 1, vec![]).unwrap();
        let bottom = Image::new(0, 1, 1, vec![]).unwrap();
        let err = Image::vconcat(&top, &bottom).unwrap_err();
        assert_eq!(err.0, "height overflows u32");
    }

    #[test]
    fn test_try_from_fn_reports_bad_shape() {
        let err = Image::try_from_fn(2, 2, 0, |_, _, _| 0).unwrap_err();
        assert!(matches!(err, QuadwireError::InvalidImage(_)));
        assert!(err.to_string().contains("at least 1"));

        let image = Image::try_from_fn(3, 2, 1, |x, y, _| (x + 10 * y) as u8).unwrap();
        assert_eq!(image.data(), &[0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_map_samples_keeps_shape() {
        let image = gradient(3, 3, 3);
        let inverted = image.map_samples(|v| 255 - v);
        assert_eq!(inverted.width(), 3);
        assert!(image
            .data()
            .iter()
            .zip(inverted.data())
            .all(|(a, b)| *a == 255 - *b));
    }

    #[test]
    fn test_msgpack_uses_bin_and_revalidates() {
        let image = gradient(2, 2, 1);
        let encoded = MsgPackCodec::encode(&image).unwrap();
        let decoded: Image = MsgPackCodec::decode(&encoded).unwrap();
        assert_eq!(decoded, image);

        #[derive(Serialize)]
        struct Forged {
            width: u32,
            height: u32,
            channels: u32,
            #[serde(with = "serde_bytes")]
            data: Vec<u8>,
        }
        let forged = MsgPackCodec::encode(&Forged {
            width: 100,
            height: 100,
            channels: 3,
            data: vec![1, 2, 3],
        })
        .unwrap();
        assert!(MsgPackCodec::decode::<Image>(&forged).is_err());
    }
}
