//! External transform collaborator interface.
//!
//! A worker owns one [`Transform`]. The transform declares the variant
//! names it produces through a [`VariantSchema`] and maps each input
//! quadrant to a [`VariantSet`] holding exactly those variants. The
//! transport never interprets variant names.
//!
//! # Example
//!
//! ```
//! use quadwire::{FnTransform, Transform, VariantSchema, VariantSet};
//! use quadwire::Image;
//!
//! let negate = FnTransform::new(VariantSchema::single("negated"), |image: Image| {
//!     Ok(VariantSet::single("negated", image.map_samples(|v| !v)))
//! });
//!
//! let image = Image::from_fn(2, 2, 1, |_, _, _| 0x0F);
//! let out = negate.apply(image).unwrap();
//! assert_eq!(out.get("negated").unwrap().data(), &[0xF0; 4]);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image::Image;

/// Failure reported by a transform.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransformError {
    message: String,
}

impl TransformError {
    /// Create a new transform error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Human-readable reason.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Declared, ordered set of variant names a transform produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSchema {
    names: Vec<String>,
}

impl VariantSchema {
    /// Build a schema; duplicate names are dropped, first occurrence wins.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !out.contains(&name) {
                out.push(name);
            }
        }
        Self { names: out }
    }

    /// Schema with one variant.
    pub fn single(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
        }
    }

    /// Declared names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// True if `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Number of declared variants.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Verify `output` holds exactly the declared variants.
    pub fn check(&self, output: &VariantSet) -> Result<(), TransformError> {
        let missing: Vec<&str> = self
            .names
            .iter()
            .filter(|n| output.get(n).is_none())
            .map(String::as_str)
            .collect();
        let undeclared: Vec<&str> = output.names().filter(|n| !self.contains(n)).collect();

        if missing.is_empty() && undeclared.is_empty() {
            return Ok(());
        }
        Err(TransformError::new(format!(
            "output does not match declared variants (missing {:?}, undeclared {:?})",
            missing, undeclared
        )))
    }
}

/// Named output images for one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantSet(BTreeMap<String, Image>);

impl VariantSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set holding one variant.
    pub fn single(name: impl Into<String>, image: Image) -> Self {
        let mut set = Self::new();
        set.insert(name, image);
        set
    }

    /// Insert or replace a variant.
    pub fn insert(&mut self, name: impl Into<String>, image: Image) -> Option<Image> {
        self.0.insert(name.into(), image)
    }

    /// Look up a variant.
    pub fn get(&self, name: &str) -> Option<&Image> {
        self.0.get(name)
    }

    /// Remove and return a variant.
    pub fn remove(&mut self, name: &str) -> Option<Image> {
        self.0.remove(name)
    }

    /// Variant names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate `(name, image)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Image)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of variants.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Move all variants of `other` into `self`.
    pub fn extend(&mut self, other: VariantSet) {
        self.0.extend(other.0);
    }
}

impl<S: Into<String>> FromIterator<(S, Image)> for VariantSet {
    fn from_iter<T: IntoIterator<Item = (S, Image)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A pixel transform run by a worker on each received quadrant.
///
/// Implementations run on a blocking thread and may be called for several
/// connections at once.
pub trait Transform: Send + Sync + 'static {
    /// Variants this transform produces.
    fn schema(&self) -> &VariantSchema;

    /// Transform one quadrant.
    fn apply(&self, image: Image) -> Result<VariantSet, TransformError>;
}

impl<T: Transform + ?Sized> Transform for Arc<T> {
    fn schema(&self) -> &VariantSchema {
        (**self).schema()
    }

    fn apply(&self, image: Image) -> Result<VariantSet, TransformError> {
        (**self).apply(image)
    }
}

/// Closure-backed transform with an explicit schema.
pub struct FnTransform<F> {
    schema: VariantSchema,
    f: F,
}

impl<F> FnTransform<F>
where
    F: Fn(Image) -> Result<VariantSet, TransformError> + Send + Sync + 'static,
{
    /// Wrap `f`, declaring that it produces `schema`.
    pub fn new(schema: VariantSchema, f: F) -> Self {
        Self { schema, f }
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(Image) -> Result<VariantSet, TransformError> + Send + Sync + 'static,
{
    fn schema(&self) -> &VariantSchema {
        &self.schema
    }

    fn apply(&self, image: Image) -> Result<VariantSet, TransformError> {
        (self.f)(image)
    }
}

/// Returns the quadrant unchanged as variant `"identity"`.
pub struct IdentityTransform {
    schema: VariantSchema,
}

impl IdentityTransform {
    /// Variant name produced.
    pub const VARIANT: &'static str = "identity";

    /// Create the transform.
    pub fn new() -> Self {
        Self {
            schema: VariantSchema::single(Self::VARIANT),
        }
    }
}

impl Default for IdentityTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for IdentityTransform {
    fn schema(&self) -> &VariantSchema {
        &self.schema
    }

    fn apply(&self, image: Image) -> Result<VariantSet, TransformError> {
        Ok(VariantSet::single(Self::VARIANT, image))
    }
}

/// Inverts every sample (`255 - v`) as variant `"inverted"`.
pub struct InvertTransform {
    schema: VariantSchema,
}

impl InvertTransform {
    /// Variant name produced.
    pub const VARIANT: &'static str = "inverted";

    /// Create the transform.
    pub fn new() -> Self {
        Self {
            schema: VariantSchema::single(Self::VARIANT),
        }
    }
}

impl Default for InvertTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for InvertTransform {
    fn schema(&self) -> &VariantSchema {
        &self.schema
    }

    fn apply(&self, image: Image) -> Result<VariantSet, TransformError> {
        Ok(VariantSet::single(Self::VARIANT, image.map_samples(|v| 255 - v)))
    }
}

/// Single-channel BT.601 luma as variant `"gray"`.
///
/// One- and two-channel inputs are treated as already gray (the second
/// channel being alpha); for three or more channels the first three are
/// read as R, G, B.
pub struct GrayscaleTransform {
    schema: VariantSchema,
}

impl GrayscaleTransform {
    /// Variant name produced.
    pub const VARIANT: &'static str = "gray";

    /// Create the transform.
    pub fn new() -> Self {
        Self {
            schema: VariantSchema::single(Self::VARIANT),
        }
    }
}

impl Default for GrayscaleTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for GrayscaleTransform {
    fn schema(&self) -> &VariantSchema {
        &self.schema
    }

    fn apply(&self, image: Image) -> Result<VariantSet, TransformError> {
        let channels = image.channels() as usize;
        let data: Vec<u8> = image
            .data()
            .chunks_exact(channels)
            .map(|px| match px {
                [r, g, b, ..] => {
                    let luma = 299 * u32::from(*r) + 587 * u32::from(*g) + 114 * u32::from(*b);
                    ((luma + 500) / 1000) as u8
                }
                [v, ..] => *v,
                [] => 0,
            })
            .collect();
        let gray = Image::new(image.width(), image.height(), 1, data)
            .map_err(|e| TransformError::new(e.to_string()))?;
        Ok(VariantSet::single(Self::VARIANT, gray))
    }
}

/// Runs several transforms on the same quadrant and merges their outputs.
pub struct MultiTransform {
    schema: VariantSchema,
    parts: Vec<Arc<dyn Transform>>,
}

impl MultiTransform {
    /// Combine `parts`; variant names must not collide.
    pub fn new(parts: Vec<Arc<dyn Transform>>) -> Result<Self, TransformError> {
        let mut names: Vec<String> = Vec::new();
        for part in &parts {
            for name in part.schema().names() {
                if names.contains(name) {
                    return Err(TransformError::new(format!(
                        "variant '{}' declared by more than one transform",
                        name
                    )));
                }
                names.push(name.clone());
            }
        }
        Ok(Self {
            schema: VariantSchema::new(names),
            parts,
        })
    }
}

impl Transform for MultiTransform {
    fn schema(&self) -> &VariantSchema {
        &self.schema
    }

    fn apply(&self, image: Image) -> Result<VariantSet, TransformError> {
        let mut out = VariantSet::new();
        let Some((last, rest)) = self.parts.split_last() else {
            return Ok(out);
        };
        for part in rest {
            out.extend(part.apply(image.clone())?);
        }
        out.extend(last.apply(image)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb(width: u32, height: u32) -> Image {
        Image::from_fn(width, height, 3, |x, y, c| (x * 40 + y * 20 + c * 7) as u8)
    }

    #[test]
    fn test_schema_dedupes_in_order() {
        let schema = VariantSchema::new(["edges", "gray", "edges"]);
        assert_eq!(schema.names(), &["edges".to_string(), "gray".to_string()]);
        assert!(schema.contains("gray"));
        assert!(!schema.contains("blur"));
    }

    #[test]
    fn test_schema_check_reports_missing_and_undeclared() {
        let schema = VariantSchema::new(["a", "b"]);
        let mut output = VariantSet::single("a", rgb(1, 1));
        output.insert("c", rgb(1, 1));

        let err = schema.check(&output).unwrap_err();
        assert!(err.message().contains("\"b\""));
        assert!(err.message().contains("\"c\""));

        output.remove("c");
        output.insert("b", rgb(1, 1));
        assert!(schema.check(&output).is_ok());
    }

    #[test]
    fn test_identity_returns_input() {
        let image = rgb(3, 2);
        let out = IdentityTransform::new().apply(image.clone()).unwrap();
        assert_eq!(out.get(IdentityTransform::VARIANT), Some(&image));
    }

    #[test]
    fn test_invert_flips_every_sample() {
        let image = rgb(4, 4);
        let out = InvertTransform::new().apply(image.clone()).unwrap();
        let inverted = out.get(InvertTransform::VARIANT).unwrap();
        for (a, b) in image.data().iter().zip(inverted.data()) {
            assert_eq!(*b, 255 - *a);
        }
    }

    #[test]
    fn test_grayscale_weights() {
        let image = Image::new(3, 1, 3, vec![255, 0, 0, 0, 255, 0, 0, 0, 255]).unwrap();
        let out = GrayscaleTransform::new().apply(image).unwrap();
        let gray = out.get(GrayscaleTransform::VARIANT).unwrap();
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.data(), &[76, 150, 29]);
    }

    #[test]
    fn test_grayscale_passes_single_channel_through() {
        let image = Image::from_fn(2, 2, 1, |x, y, _| (x + y * 2) as u8);
        let out = GrayscaleTransform::new().apply(image.clone()).unwrap();
        assert_eq!(out.get("gray"), Some(&image));
    }

    #[test]
    fn test_multi_transform_merges_outputs() {
        let parts: Vec<Arc<dyn Transform>> = vec![
            Arc::new(GrayscaleTransform::new()),
            Arc::new(InvertTransform::new()),
        ];
        let multi = MultiTransform::new(parts).unwrap();
        assert_eq!(multi.schema().len(), 2);

        let out = multi.apply(rgb(2, 2)).unwrap();
        assert!(multi.schema().check(&out).is_ok());
        assert_eq!(out.names().collect::<Vec<_>>(), vec!["gray", "inverted"]);
    }

    #[test]
    fn test_multi_transform_rejects_name_collision() {
        let parts: Vec<Arc<dyn Transform>> = vec![
            Arc::new(InvertTransform::new()),
            Arc::new(InvertTransform::new()),
        ];
        let result = MultiTransform::new(parts);
        assert!(result.is_err());
    }

    #[test]
    fn test_fn_transform_propagates_error() {
        let failing = FnTransform::new(VariantSchema::single("x"), |_image: Image| {
            Err(TransformError::new("kernel exploded"))
        });
        let err = failing.apply(rgb(1, 1)).unwrap_err();
        assert_eq!(err.to_string(), "kernel exploded");
    }
}
