use crate::{
    algorithms::{GeometricDetector, PreprocessSettings},
    classification::{ClassificationRules, ElementClassifier},
    pipeline::{DetectionSettings, PageAnalyzer},
    traits::{ImagePreprocessor, PrimitiveDetector},
};

/// Builder for page analyzers with a fluent API
pub struct PageAnalyzerBuilder {
    preprocessors: Option<Vec<Box<dyn ImagePreprocessor>>>,
    detectors: Option<Vec<Box<dyn PrimitiveDetector>>>,
    classifier: Option<ElementClassifier>,
}

impl PageAnalyzerBuilder {
    /// Create a new page analyzer builder
    pub fn new() -> Self {
        Self {
            preprocessors: None,
            detectors: None,
            classifier: None,
        }
    }

    /// Builder preloaded with the chain, detectors and rules of `settings`
    pub fn from_settings(settings: &DetectionSettings) -> Self {
        Self {
            preprocessors: Some(settings.preprocess.chain()),
            detectors: Some(settings.detectors.detectors()),
            classifier: Some(ElementClassifier::new(settings.classification.clone())),
        }
    }

    /// Append a preprocessing step. On a fresh builder the step replaces the
    /// default chain; after `from_settings` it runs after the configured one.
    pub fn add_preprocessor<P>(mut self, preprocessor: P) -> Self
    where
        P: ImagePreprocessor + 'static,
    {
        self.preprocessors
            .get_or_insert_with(Vec::new)
            .push(Box::new(preprocessor));
        self
    }

    /// Skip preprocessing, for pages that are already binarised with ink as
    /// foreground
    pub fn without_preprocessing(mut self) -> Self {
        self.preprocessors = Some(Vec::new());
        self
    }

    /// Append a detector. On a fresh builder it replaces the default set;
    /// after `from_settings` it runs alongside the configured detectors.
    pub fn add_detector<D>(mut self, detector: D) -> Self
    where
        D: PrimitiveDetector + 'static,
    {
        self.detectors
            .get_or_insert_with(Vec::new)
            .push(Box::new(detector));
        self
    }

    /// Set the classification rules (replaces any existing ones)
    pub fn set_rules(mut self, rules: ClassificationRules) -> Self {
        self.classifier = Some(ElementClassifier::new(rules));
        self
    }

    /// Build the analyzer with default components if not specified
    pub fn build(self) -> PageAnalyzer {
        let preprocessors = self
            .preprocessors
            .unwrap_or_else(|| PreprocessSettings::default().chain());

        let detector = self
            .detectors
            .map(GeometricDetector::new)
            .unwrap_or_default();

        PageAnalyzer::new(preprocessors, detector, self.classifier.unwrap_or_default())
    }
}

impl Default for PageAnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{InkForeground, TextRegionDetector};

    fn expected_info(preprocessors: usize, detectors: &[&str]) -> String {
        format!("PageAnalyzer: {} preprocessors, detectors [{}]", preprocessors, detectors.join(", "))
    }

    #[test]
    fn test_fresh_builder_replaces_defaults() {
        let analyzer = PageAnalyzerBuilder::new()
            .add_preprocessor(InkForeground)
            .add_detector(TextRegionDetector::default())
            .build();
        assert_eq!(analyzer.info(), expected_info(1, &["text_regions"]));
    }

    #[test]
    fn test_settings_builder_appends() {
        let settings = DetectionSettings::default();
        let configured = settings.preprocess.chain().len();
        let mut detectors = GeometricDetector::from_settings(&settings.detectors).detector_names();

        let analyzer = PageAnalyzerBuilder::from_settings(&settings)
            .add_preprocessor(InkForeground)
            .add_detector(TextRegionDetector::default())
            .build();

        detectors.push("text_regions");
        assert_eq!(analyzer.info(), expected_info(configured + 1, &detectors));
    }
}
