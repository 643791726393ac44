use image::GrayImage;
use crate::{error::Result, types::Primitive};

/// Trait for page preprocessing steps
pub trait ImagePreprocessor: Send + Sync {
    /// Short name used in warnings and logs
    fn name(&self) -> &'static str;

    /// Transform the page (denoise, equalise, threshold, ...)
    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage>;
}

/// Trait for geometric primitive detectors.
///
/// Detectors run on the preprocessed page, where ink is foreground (255)
/// and paper is background (0).
pub trait PrimitiveDetector: Send + Sync {
    /// Short name used in warnings and logs
    fn name(&self) -> &'static str;

    /// Find primitives on a binarised page
    fn detect(&self, image: &GrayImage) -> Result<Vec<Primitive>>;
}
