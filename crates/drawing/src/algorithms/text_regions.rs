use image::GrayImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::{
    algorithms::{contour_bbox, external_contours},
    error::Result,
    traits::PrimitiveDetector,
    types::{Primitive, TextRegion},
};

/// Outer contours sized like a text label. All bounds are exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TextRegionDetector {
    pub min_width: f64,
    pub max_width: f64,
    pub min_height: f64,
    pub max_height: f64,
    /// Aspect range (exclusive) that marks a dimension string
    pub dimension_aspect: (f64, f64),
}

impl Default for TextRegionDetector {
    fn default() -> Self {
        Self {
            min_width: 10.0,
            max_width: 200.0,
            min_height: 5.0,
            max_height: 50.0,
            dimension_aspect: (2.0, 10.0),
        }
    }
}

impl PrimitiveDetector for TextRegionDetector {
    fn name(&self) -> &'static str {
        "text_regions"
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Primitive>> {
        let regions = external_contours(image)
            .iter()
            .map(|contour| contour_bbox(&contour.points))
            .filter(|bbox| {
                bbox.width > self.min_width
                    && bbox.width < self.max_width
                    && bbox.height > self.min_height
                    && bbox.height < self.max_height
            })
            .map(|bbox| {
                let aspect_ratio = bbox.aspect_ratio();
                Primitive::TextRegion(TextRegion {
                    bbox,
                    aspect_ratio,
                    dimension_candidate: aspect_ratio > self.dimension_aspect.0
                        && aspect_ratio < self.dimension_aspect.1,
                })
            })
            .collect();

        Ok(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn blob(img: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, Luma([255u8]));
            }
        }
    }

    #[test]
    fn test_flags_dimension_candidates() {
        let mut img = GrayImage::new(300, 200);
        blob(&mut img, 10, 10, 60, 12); // 5:1 label
        blob(&mut img, 100, 100, 30, 20); // squat annotation
        blob(&mut img, 150, 10, 120, 3); // too thin

        let primitives = TextRegionDetector::default()
            .detect(&img)
            .expect("Should detect text regions");

        let mut regions: Vec<TextRegion> = primitives
            .into_iter()
            .filter_map(|p| match p {
                Primitive::TextRegion(region) => Some(region),
                _ => None,
            })
            .collect();
        regions.sort_by(|a, b| a.bbox.x.total_cmp(&b.bbox.x));

        assert_eq!(regions.len(), 2);
        assert!(regions[0].dimension_candidate);
        assert_eq!(regions[0].aspect_ratio, 5.0);
        assert!(!regions[1].dimension_candidate);
    }
}
