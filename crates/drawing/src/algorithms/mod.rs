pub mod preprocessing;
pub mod lines;
pub mod rectangles;
pub mod circles;
pub mod text_regions;

pub use preprocessing::*;
pub use lines::*;
pub use rectangles::*;
pub use circles::*;
pub use text_regions::*;

use image::GrayImage;
use imageproc::contours::{BorderType, Contour};
use imageproc::point::Point;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use takeoff_common::BoundingBox;
use tracing::{debug, warn};
use crate::{
    traits::PrimitiveDetector,
    types::{DetectionSet, PrimitiveKind},
};

/// Outer borders that are not nested inside another shape
pub(crate) fn external_contours(image: &GrayImage) -> Vec<Contour<i32>> {
    imageproc::contours::find_contours::<i32>(image)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .collect()
}

/// Pixel-inclusive bounding box of a point set
pub(crate) fn contour_bbox(points: &[Point<i32>]) -> BoundingBox {
    let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
    let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    if points.is_empty() {
        return BoundingBox::default();
    }
    BoundingBox::new(
        min_x as f64,
        min_y as f64,
        (max_x - min_x + 1) as f64,
        (max_y - min_y + 1) as f64,
    )
}

/// Parameters for the four detectors, plus which of them to skip
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DetectorSettings {
    pub lines: HoughLineDetector,
    pub rectangles: ContourRectangleDetector,
    pub circles: GradientCircleDetector,
    pub text_regions: TextRegionDetector,
    pub disabled: Vec<PrimitiveKind>,
}

impl DetectorSettings {
    /// The enabled detectors, in line/rectangle/circle/text order
    pub fn detectors(&self) -> Vec<Box<dyn PrimitiveDetector>> {
        let mut detectors: Vec<Box<dyn PrimitiveDetector>> = Vec::new();
        if !self.disabled.contains(&PrimitiveKind::Line) {
            detectors.push(Box::new(self.lines.clone()));
        }
        if !self.disabled.contains(&PrimitiveKind::Rectangle) {
            detectors.push(Box::new(self.rectangles.clone()));
        }
        if !self.disabled.contains(&PrimitiveKind::Circle) {
            detectors.push(Box::new(self.circles.clone()));
        }
        if !self.disabled.contains(&PrimitiveKind::TextRegion) {
            detectors.push(Box::new(self.text_regions.clone()));
        }
        detectors
    }
}

/// Runs independent detectors over one binarised page.
///
/// A detector that errors contributes a warning and no primitives; the
/// remaining detectors still run.
pub struct GeometricDetector {
    detectors: Vec<Box<dyn PrimitiveDetector>>,
}

impl GeometricDetector {
    pub fn new(detectors: Vec<Box<dyn PrimitiveDetector>>) -> Self {
        Self { detectors }
    }

    pub fn from_settings(settings: &DetectorSettings) -> Self {
        Self::new(settings.detectors())
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn detect(&self, image: &GrayImage) -> DetectionSet {
        let mut set = DetectionSet {
            image_width: image.width(),
            image_height: image.height(),
            ..Default::default()
        };

        for detector in &self.detectors {
            match detector.detect(image) {
                Ok(primitives) => {
                    debug!("{} detector found {} primitives", detector.name(), primitives.len());
                    set.primitives.extend(primitives);
                }
                Err(e) => {
                    warn!("{} detector failed: {}", detector.name(), e);
                    set.warnings.push(format!("{} detection failed: {}", detector.name(), e));
                }
            }
        }

        set
    }
}

impl Default for GeometricDetector {
    fn default() -> Self {
        Self::from_settings(&DetectorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::{DrawingError, Result}, types::Primitive};
    use image::Luma;

    struct FailingDetector;

    impl PrimitiveDetector for FailingDetector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&self, _image: &GrayImage) -> Result<Vec<Primitive>> {
            Err(DrawingError::Detection {
                detector: "failing".to_string(),
                message: "boom".to_string(),
            })
        }
    }

    fn page_with_room() -> GrayImage {
        let mut img = GrayImage::new(200, 200);
        for y in 40..140 {
            for x in 40..140 {
                img.put_pixel(x, y, Luma([255u8]));
            }
        }
        img
    }

    #[test]
    fn test_failing_detector_does_not_stop_others() {
        let detector = GeometricDetector::new(vec![
            Box::new(FailingDetector),
            Box::new(ContourRectangleDetector::default()),
        ]);

        let set = detector.detect(&page_with_room());
        assert_eq!(set.warnings.len(), 1);
        assert!(set.warnings[0].contains("failing"));
        assert_eq!(set.count(PrimitiveKind::Rectangle), 1);
    }

    #[test]
    fn test_disabled_detectors_are_skipped() {
        let settings = DetectorSettings {
            disabled: vec![PrimitiveKind::Circle, PrimitiveKind::Line],
            ..Default::default()
        };
        let detector = GeometricDetector::from_settings(&settings);
        assert_eq!(detector.detector_names(), vec!["rectangles", "text_regions"]);
    }

    #[test]
    fn test_contour_bbox_is_pixel_inclusive() {
        let points = [Point::new(3, 4), Point::new(12, 4), Point::new(12, 9)];
        assert_eq!(contour_bbox(&points), BoundingBox::new(3.0, 4.0, 10.0, 6.0));
    }
}
