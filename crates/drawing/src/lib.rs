//! # Drawing Analysis Library
//!
//! Turns rasterised construction drawings into typed drawing elements.
//! A page is binarised, scanned by independent geometric detectors (line
//! segments, rectangles, circles, text-like regions), and every primitive is
//! mapped to an element type through configurable rule tables. Pages are then
//! merged with annotation-service elements and consolidated per document.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drawing::PageAnalyzer;
//!
//! let analyzer = PageAnalyzer::builder().build();
//! let page = analyzer.analyze_path("floor_plan.png")?;
//! println!("{} elements", page.elements.len());
//!
//! page.save_geojson("floor_plan.geojson")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Analyzer
//!
//! ```rust,no_run
//! use drawing::{PageAnalyzer, algorithms::*};
//!
//! let analyzer = PageAnalyzer::builder()
//!     .without_preprocessing()
//!     .add_detector(HoughLineDetector { min_line_length: 60.0, ..Default::default() })
//!     .add_detector(ContourRectangleDetector::default())
//!     .build();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod classification;
pub mod consolidation;
pub mod pipeline;
pub mod io;

pub use error::{DrawingError, Result};
pub use types::{DetectionSet, Primitive, PrimitiveKind};
pub use traits::*;
pub use classification::{ClassificationRules, Condition, ElementClassifier, Rule};
pub use consolidation::{
    infer_drawing_type, merge_page, DocumentAnalysis, DrawingTotals, PageAnalysis, PageConsolidator,
};
pub use pipeline::{builder::PageAnalyzerBuilder, DetectionSettings, PageAnalyzer, PageGeometry};
pub use io::elements_to_geojson;

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma};
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut};
    use imageproc::rect::Rect;
    use takeoff_common::ElementType;

    /// Dark ink on light paper, like a scanned sheet
    fn create_scanned_plan() -> GrayImage {
        let mut img = GrayImage::from_pixel(400, 300, Luma([235u8]));
        let ink = Luma([15u8]);
        // a room outline
        for offset in 0..3 {
            draw_hollow_rect_mut(
                &mut img,
                Rect::at(40 + offset, 40 + offset).of_size(240 - 2 * offset as u32, 160 - 2 * offset as u32),
                ink,
            );
        }
        // a dimension label
        draw_filled_rect_mut(&mut img, Rect::at(300, 250).of_size(60, 12), ink);
        // a column
        draw_filled_circle_mut(&mut img, (340, 100), 35, ink);
        img
    }

    #[test]
    fn test_analyzer_end_to_end() {
        let analyzer = PageAnalyzer::default();
        let page = analyzer.analyze(&DynamicImage::ImageLuma8(create_scanned_plan()));

        assert!(page.warnings.is_empty(), "unexpected warnings: {:?}", page.warnings);
        assert!(!page.elements.is_empty());
        let types: Vec<&ElementType> = page.elements.iter().map(|e| &e.element_type).collect();
        assert!(types.contains(&&ElementType::Room), "got {types:?}");
        assert!(types.contains(&&ElementType::Dimension), "got {types:?}");
        assert!(types.contains(&&ElementType::Wall), "got {types:?}");
    }

    #[test]
    fn test_preprocessing_falls_back_to_grayscale() {
        let analyzer = PageAnalyzer::builder()
            .add_preprocessor(algorithms::TileEqualization { tiles_x: 0, tiles_y: 0, clip_limit: 2.0 })
            .build();

        let gray = create_scanned_plan();
        let (result, warning) = analyzer.preprocess(&gray);
        assert_eq!(result, gray);
        assert!(warning.expect("fallback warning").contains("tile_equalization"));
    }

    #[test]
    fn test_analyze_path_reports_unreadable_files() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("not_an_image.png");
        std::fs::write(&path, b"definitely not a png").expect("Should write file");

        let analyzer = PageAnalyzer::default();
        assert!(matches!(analyzer.analyze_path(&path), Err(DrawingError::ImageLoad(_))));
    }

    #[test]
    fn test_analyze_path_and_geojson_export() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let image_path = dir.path().join("plan.png");
        create_scanned_plan().save(&image_path).expect("Should save image");

        let page = PageAnalyzer::default()
            .analyze_path(&image_path)
            .expect("Should analyse saved page");
        let geojson_path = dir.path().join("plan.geojson");
        page.save_geojson(&geojson_path).expect("Should save GeoJSON");

        let written = std::fs::read_to_string(&geojson_path).expect("Should read GeoJSON");
        let collection: geojson::FeatureCollection = written.parse().expect("Should parse GeoJSON");
        assert_eq!(collection.features.len(), page.elements.len());
    }

    #[test]
    fn test_settings_round_trip_through_json() {
        let settings = DetectionSettings::default();
        let json = serde_json::to_string(&settings).expect("Should serialize settings");
        let parsed: DetectionSettings = serde_json::from_str(&json).expect("Should parse settings");
        assert_eq!(parsed, settings);

        let partial: DetectionSettings =
            serde_json::from_str(r#"{"detectors": {"disabled": ["circle"]}}"#).expect("Should parse");
        assert_eq!(partial.default_scale.as_deref(), Some("1:100"));
        assert_eq!(partial.detectors.disabled, vec![PrimitiveKind::Circle]);
    }
}
