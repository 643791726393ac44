pub mod builder;

use std::path::Path;

use image::{DynamicImage, GrayImage};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use takeoff_common::DrawingElement;
use tracing::{debug, warn};
use crate::{
    algorithms::{DetectorSettings, GeometricDetector, PreprocessSettings},
    classification::{ClassificationRules, ElementClassifier},
    error::Result,
    traits::ImagePreprocessor,
    types::{DetectionSet, PrimitiveKind},
};

/// Everything that tunes geometric page analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DetectionSettings {
    pub preprocess: PreprocessSettings,
    pub detectors: DetectorSettings,
    pub classification: ClassificationRules,
    /// Scale assumed for pages with dimension strings but no stated scale
    pub default_scale: Option<String>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            preprocess: PreprocessSettings::default(),
            detectors: DetectorSettings::default(),
            classification: ClassificationRules::default(),
            default_scale: Some("1:100".to_string()),
        }
    }
}

/// Geometric analysis of one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageGeometry {
    pub elements: Vec<DrawingElement>,
    pub detections: DetectionSet,
    /// Preprocessing fallback and detector failures
    pub warnings: Vec<String>,
}

impl PageGeometry {
    pub fn primitive_count(&self, kind: PrimitiveKind) -> usize {
        self.detections.count(kind)
    }
}

/// Preprocess, detect and classify a single page
pub struct PageAnalyzer {
    preprocessors: Vec<Box<dyn ImagePreprocessor>>,
    detector: GeometricDetector,
    classifier: ElementClassifier,
}

impl PageAnalyzer {
    /// Create a new page analyzer builder
    pub fn builder() -> builder::PageAnalyzerBuilder {
        builder::PageAnalyzerBuilder::new()
    }

    pub fn new(
        preprocessors: Vec<Box<dyn ImagePreprocessor>>,
        detector: GeometricDetector,
        classifier: ElementClassifier,
    ) -> Self {
        Self {
            preprocessors,
            detector,
            classifier,
        }
    }

    pub fn from_settings(settings: &DetectionSettings) -> Self {
        builder::PageAnalyzerBuilder::from_settings(settings).build()
    }

    /// Run the preprocessing chain. On failure the untouched grayscale page is
    /// returned together with a warning.
    pub fn preprocess(&self, gray: &GrayImage) -> (GrayImage, Option<String>) {
        let mut current = gray.clone();
        for step in &self.preprocessors {
            match step.preprocess(&current) {
                Ok(next) => current = next,
                Err(e) => {
                    warn!("Preprocessing step {} failed: {}", step.name(), e);
                    let warning = format!(
                        "Preprocessing failed at {}: {}; using the grayscale page",
                        step.name(),
                        e
                    );
                    return (gray.clone(), Some(warning));
                }
            }
        }
        (current, None)
    }

    /// Analyse a decoded page
    pub fn analyze(&self, page: &DynamicImage) -> PageGeometry {
        let gray = page.to_luma8();
        let (binary, preprocess_warning) = self.preprocess(&gray);

        let detections = self.detector.detect(&binary);
        let elements = self.classifier.classify_all(&detections);
        debug!(
            "Classified {} primitives ({} lines, {} rectangles, {} circles, {} text regions)",
            elements.len(),
            detections.count(PrimitiveKind::Line),
            detections.count(PrimitiveKind::Rectangle),
            detections.count(PrimitiveKind::Circle),
            detections.count(PrimitiveKind::TextRegion),
        );

        let mut warnings: Vec<String> = preprocess_warning.into_iter().collect();
        warnings.extend(detections.warnings.iter().cloned());

        PageGeometry {
            elements,
            detections,
            warnings,
        }
    }

    /// Decode an image file and analyse it
    pub fn analyze_path<P: AsRef<Path>>(&self, path: P) -> Result<PageGeometry> {
        let page = image::open(path.as_ref())?;
        Ok(self.analyze(&page))
    }

    /// Decode in-memory image bytes and analyse them
    pub fn analyze_bytes(&self, bytes: &[u8]) -> Result<PageGeometry> {
        let page = image::load_from_memory(bytes)?;
        Ok(self.analyze(&page))
    }

    /// Get information about the analyzer configuration
    pub fn info(&self) -> String {
        format!(
            "PageAnalyzer: {} preprocessors, detectors [{}]",
            self.preprocessors.len(),
            self.detector.detector_names().join(", ")
        )
    }
}

impl Default for PageAnalyzer {
    fn default() -> Self {
        Self::from_settings(&DetectionSettings::default())
    }
}
