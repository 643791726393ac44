//! Rule tables that turn geometric primitives into typed drawing elements.
//!
//! Each primitive kind has its own ordered table. The first rule whose
//! condition holds decides the element type; a primitive that matches no rule
//! becomes [`ElementType::Unknown`]. All comparisons are strict.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use takeoff_common::{Dimensions, DrawingElement, ElementSource, ElementType};
use crate::types::{DetectionSet, Primitive};

/// Measures a condition can test. Absent measures fail every comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveFeatures {
    pub length: Option<f64>,
    pub aspect_ratio: Option<f64>,
    pub area: Option<f64>,
    pub radius: Option<f64>,
    pub dimension_candidate: bool,
}

impl PrimitiveFeatures {
    pub fn of(primitive: &Primitive) -> Self {
        match primitive {
            Primitive::Line(line) => Self {
                length: Some(line.length),
                ..Default::default()
            },
            Primitive::Rectangle(rect) => Self {
                aspect_ratio: Some(rect.aspect_ratio),
                area: Some(rect.area),
                ..Default::default()
            },
            Primitive::Circle(circle) => Self {
                radius: Some(circle.radius),
                area: Some(circle.area),
                ..Default::default()
            },
            Primitive::TextRegion(text) => Self {
                aspect_ratio: Some(text.aspect_ratio),
                area: Some(text.bbox.area()),
                dimension_candidate: text.dimension_candidate,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "test", content = "value", rename_all = "snake_case")]
pub enum Condition {
    LengthAbove(f64),
    AspectAbove(f64),
    AspectBelow(f64),
    AreaAbove(f64),
    RadiusAbove(f64),
    DimensionCandidate,
    Always,
}

impl Condition {
    pub fn holds(&self, features: &PrimitiveFeatures) -> bool {
        match *self {
            Condition::LengthAbove(v) => features.length.is_some_and(|x| x > v),
            Condition::AspectAbove(v) => features.aspect_ratio.is_some_and(|x| x > v),
            Condition::AspectBelow(v) => features.aspect_ratio.is_some_and(|x| x < v),
            Condition::AreaAbove(v) => features.area.is_some_and(|x| x > v),
            Condition::RadiusAbove(v) => features.radius.is_some_and(|x| x > v),
            Condition::DimensionCandidate => features.dimension_candidate,
            Condition::Always => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rule {
    pub when: Condition,
    pub then: ElementType,
}

impl Rule {
    pub fn new(when: Condition, then: ElementType) -> Self {
        Self { when, then }
    }
}

/// First-match lookup in an ordered rule list
pub fn first_match(rules: &[Rule], features: &PrimitiveFeatures) -> ElementType {
    rules
        .iter()
        .find(|rule| rule.when.holds(features))
        .map(|rule| rule.then.clone())
        .unwrap_or(ElementType::Unknown)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ClassificationRules {
    pub line: Vec<Rule>,
    pub rectangle: Vec<Rule>,
    pub circle: Vec<Rule>,
    pub text_region: Vec<Rule>,
    pub confidence: KindConfidence,
}

/// Confidence given to geometric elements, per primitive kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct KindConfidence {
    pub line: f64,
    pub rectangle: f64,
    pub circle: f64,
    pub text_region: f64,
}

impl Default for KindConfidence {
    fn default() -> Self {
        Self {
            line: 0.8,
            rectangle: 0.7,
            circle: 0.6,
            text_region: 0.5,
        }
    }
}

impl Default for ClassificationRules {
    fn default() -> Self {
        use Condition::*;
        Self {
            line: vec![
                Rule::new(LengthAbove(200.0), ElementType::Wall),
                Rule::new(LengthAbove(50.0), ElementType::Beam),
                Rule::new(Always, ElementType::DetailLine),
            ],
            rectangle: vec![
                Rule::new(AspectAbove(5.0), ElementType::WallSection),
                Rule::new(AspectBelow(0.2), ElementType::Column),
                Rule::new(AreaAbove(10_000.0), ElementType::Room),
                Rule::new(AreaAbove(1_000.0), ElementType::Window),
                Rule::new(Always, ElementType::Opening),
            ],
            circle: vec![
                Rule::new(RadiusAbove(30.0), ElementType::ColumnCircular),
                Rule::new(Always, ElementType::Hole),
            ],
            text_region: vec![
                Rule::new(DimensionCandidate, ElementType::Dimension),
                Rule::new(Always, ElementType::Annotation),
            ],
            confidence: KindConfidence::default(),
        }
    }
}

/// Maps primitives to geometry-sourced drawing elements
#[derive(Debug, Clone, Default)]
pub struct ElementClassifier {
    rules: ClassificationRules,
}

impl ElementClassifier {
    pub fn new(rules: ClassificationRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ClassificationRules {
        &self.rules
    }

    pub fn element_type(&self, primitive: &Primitive) -> ElementType {
        let table = match primitive {
            Primitive::Line(_) => &self.rules.line,
            Primitive::Rectangle(_) => &self.rules.rectangle,
            Primitive::Circle(_) => &self.rules.circle,
            Primitive::TextRegion(_) => &self.rules.text_region,
        };
        first_match(table, &PrimitiveFeatures::of(primitive))
    }

    pub fn classify(&self, primitive: &Primitive) -> DrawingElement {
        let confidence = &self.rules.confidence;
        let (confidence, dimensions) = match primitive {
            Primitive::Line(line) => (confidence.line, Dimensions::length(line.length)),
            Primitive::Rectangle(rect) => (
                confidence.rectangle,
                Dimensions::rect(rect.bbox.width, rect.bbox.height),
            ),
            Primitive::Circle(circle) => (
                confidence.circle,
                Dimensions {
                    width: Some(circle.diameter),
                    height: Some(circle.diameter),
                    area: Some(circle.area),
                    ..Default::default()
                },
            ),
            Primitive::TextRegion(text) => (
                confidence.text_region,
                Dimensions {
                    width: Some(text.bbox.width),
                    height: Some(text.bbox.height),
                    ..Default::default()
                },
            ),
        };

        DrawingElement::new(self.element_type(primitive), confidence)
            .with_bbox(primitive.bbox())
            .with_dimensions(dimensions)
            .with_source(ElementSource::Geometry)
    }

    pub fn classify_all(&self, detections: &DetectionSet) -> Vec<DrawingElement> {
        detections.primitives.iter().map(|p| self.classify(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use takeoff_common::BoundingBox;
    use crate::types::{CirclePrimitive, LineSegment, RectanglePrimitive, TextRegion};

    fn line(length: f64) -> Primitive {
        Primitive::Line(LineSegment::new([0.0, 0.0], [length, 0.0]))
    }

    fn rect(width: f64, height: f64) -> Primitive {
        Primitive::Rectangle(RectanglePrimitive::from_bbox(BoundingBox::new(0.0, 0.0, width, height)))
    }

    #[test]
    fn test_line_lengths() {
        let classifier = ElementClassifier::default();
        assert_eq!(classifier.element_type(&line(250.0)), ElementType::Wall);
        assert_eq!(classifier.element_type(&line(80.0)), ElementType::Beam);
        assert_eq!(classifier.element_type(&line(20.0)), ElementType::DetailLine);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let classifier = ElementClassifier::default();
        assert_eq!(classifier.element_type(&line(200.0)), ElementType::Beam);
        assert_eq!(classifier.element_type(&line(50.0)), ElementType::DetailLine);
    }

    #[test]
    fn test_rectangles() {
        let classifier = ElementClassifier::default();
        assert_eq!(classifier.element_type(&rect(500.0, 20.0)), ElementType::WallSection);
        assert_eq!(classifier.element_type(&rect(10.0, 100.0)), ElementType::Column);
        // area exactly 10000 is not a room
        assert_eq!(classifier.element_type(&rect(100.0, 100.0)), ElementType::Window);
        assert_eq!(classifier.element_type(&rect(200.0, 100.0)), ElementType::Room);
        assert_eq!(classifier.element_type(&rect(20.0, 20.0)), ElementType::Opening);
    }

    #[test]
    fn test_circles_and_text() {
        let classifier = ElementClassifier::default();
        let big = Primitive::Circle(CirclePrimitive::new([50.0, 50.0], 40.0));
        let small = Primitive::Circle(CirclePrimitive::new([50.0, 50.0], 8.0));
        assert_eq!(classifier.element_type(&big), ElementType::ColumnCircular);
        assert_eq!(classifier.element_type(&small), ElementType::Hole);

        let label = Primitive::TextRegion(TextRegion {
            bbox: BoundingBox::new(0.0, 0.0, 60.0, 12.0),
            aspect_ratio: 5.0,
            dimension_candidate: true,
        });
        let element = classifier.classify(&label);
        assert_eq!(element.element_type, ElementType::Dimension);
        assert_eq!(element.confidence, 0.5);
        assert_eq!(element.source, ElementSource::Geometry);
    }

    #[test]
    fn test_no_matching_rule_is_unknown() {
        let classifier = ElementClassifier::new(ClassificationRules {
            line: vec![Rule::new(Condition::LengthAbove(1_000.0), ElementType::Wall)],
            ..Default::default()
        });
        assert_eq!(classifier.element_type(&line(20.0)), ElementType::Unknown);
    }

    #[test]
    fn test_classified_element_carries_geometry() {
        let element = ElementClassifier::default().classify(&rect(500.0, 20.0));
        assert_eq!(element.confidence, 0.7);
        assert_eq!(element.bbox, Some(BoundingBox::new(0.0, 0.0, 500.0, 20.0)));
        let dims = element.dimensions.expect("rectangle has dimensions");
        assert_eq!(dims.area, Some(10_000.0));
    }

    #[test]
    fn test_rules_deserialize_from_json() {
        let json = r#"{
            "line": [
                {"when": {"test": "length_above", "value": 100.0}, "then": "wall"},
                {"when": {"test": "always"}, "then": "detail_line"}
            ]
        }"#;
        let rules: ClassificationRules = serde_json::from_str(json).expect("Should parse rules");
        let classifier = ElementClassifier::new(rules);
        assert_eq!(classifier.element_type(&line(150.0)), ElementType::Wall);
        // tables not given keep their defaults
        assert_eq!(classifier.element_type(&rect(500.0, 20.0)), ElementType::WallSection);
    }
}
