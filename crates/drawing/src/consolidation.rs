//! Per-page merging of annotation and geometric elements, and the
//! document-level roll-up of analysed pages.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use takeoff_common::{DrawingElement, DrawingMetadata, DrawingType, ElementType};
use tracing::debug;

/// Annotation elements first, then every geometric element that overlaps none
/// of them. An overlapping geometric element is dropped after raising the
/// confidence of the first annotation element it overlaps.
pub fn merge_page(
    annotations: Vec<DrawingElement>,
    geometric: Vec<DrawingElement>,
) -> Vec<DrawingElement> {
    let annotation_count = annotations.len();
    let mut merged = annotations;

    for element in geometric {
        let hit = merged[..annotation_count]
            .iter()
            .position(|existing| existing.overlaps(&element));
        match hit {
            Some(index) => merged[index].absorb_confidence(element.confidence),
            None => merged.push(element),
        }
    }

    merged
}

/// Element counts and summed measures
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawingTotals {
    pub element_counts: BTreeMap<String, usize>,
    pub total_area: f64,
    pub total_length: f64,
}

impl DrawingTotals {
    pub fn of(elements: &[DrawingElement]) -> Self {
        let mut totals = Self::default();
        for element in elements {
            *totals
                .element_counts
                .entry(element.element_type.to_string())
                .or_default() += 1;
            if let Some(dims) = &element.dimensions {
                let area = dims.area.or_else(|| Some(dims.width? * dims.height?));
                totals.total_area += area.unwrap_or(0.0);
                totals.total_length += dims.length.unwrap_or(0.0);
            }
        }
        totals
    }
}

/// Result of analysing one page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageAnalysis {
    pub page_number: u32,
    pub elements: Vec<DrawingElement>,
    pub metadata: DrawingMetadata,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub confidence: f64,
}

impl PageAnalysis {
    /// A page that could not be analysed at all
    pub fn failed(page_number: u32, reason: impl std::fmt::Display) -> Self {
        Self {
            page_number,
            elements: Vec::new(),
            metadata: DrawingMetadata::default(),
            warnings: vec![format!("Page {} analysis failed: {}", page_number, reason)],
            suggestions: Vec::new(),
            confidence: 0.0,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.elements.is_empty() && self.confidence == 0.0
    }
}

/// All pages of one document, merged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub page_count: usize,
    pub elements: Vec<DrawingElement>,
    pub metadata: DrawingMetadata,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub confidence: f64,
    pub totals: DrawingTotals,
}

/// Page-level heuristics and document consolidation
#[derive(Debug, Clone)]
pub struct PageConsolidator {
    /// Assumed when a page has dimension strings but no stated scale
    pub default_scale: Option<String>,
}

impl Default for PageConsolidator {
    fn default() -> Self {
        Self {
            default_scale: Some("1:100".to_string()),
        }
    }
}

impl PageConsolidator {
    pub fn new(default_scale: Option<String>) -> Self {
        Self { default_scale }
    }

    /// Merge one page's element sources and attach its warnings, suggestions
    /// and confidence. `warnings` carries anything recorded upstream
    /// (preprocessing fallback, failed detectors, annotation errors).
    pub fn analyze_page(
        &self,
        page_number: u32,
        annotations: Vec<DrawingElement>,
        mut metadata: DrawingMetadata,
        geometric: Vec<DrawingElement>,
        mut warnings: Vec<String>,
    ) -> PageAnalysis {
        let elements = merge_page(annotations, geometric);

        let has_dimensions = elements
            .iter()
            .any(|e| e.element_type == ElementType::Dimension);
        if metadata.scale.is_none() && has_dimensions {
            metadata.scale = self.default_scale.clone();
        }

        warnings.extend(page_warnings(&elements, &metadata));
        let suggestions = page_suggestions(&elements);
        let confidence = page_confidence(&elements, &metadata);
        debug!(
            "Page {}: {} elements, confidence {:.2}",
            page_number,
            elements.len(),
            confidence
        );

        PageAnalysis {
            page_number,
            elements,
            metadata,
            warnings,
            suggestions,
            confidence,
        }
    }

    /// Merge analysed pages in page order. Warnings and suggestions keep
    /// their first occurrence; confidence is the mean over pages and the
    /// metadata is the first page's.
    pub fn consolidate(&self, mut pages: Vec<PageAnalysis>) -> DocumentAnalysis {
        pages.sort_by_key(|p| p.page_number);

        let page_count = pages.len();
        let confidence = if pages.is_empty() {
            0.0
        } else {
            pages.iter().map(|p| p.confidence).sum::<f64>() / page_count as f64
        };
        let metadata = pages
            .first()
            .map(|p| p.metadata.clone())
            .unwrap_or_default();

        let mut elements = Vec::new();
        let mut warnings = Vec::new();
        let mut suggestions = Vec::new();
        for page in pages {
            elements.extend(page.elements);
            warnings.extend(page.warnings);
            suggestions.extend(page.suggestions);
        }

        let totals = DrawingTotals::of(&elements);
        DocumentAnalysis {
            page_count,
            elements,
            metadata,
            warnings: dedup_in_order(warnings),
            suggestions: dedup_in_order(suggestions),
            confidence,
            totals,
        }
    }
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn page_warnings(elements: &[DrawingElement], metadata: &DrawingMetadata) -> Vec<String> {
    let mut warnings = Vec::new();
    if metadata.scale.is_none() {
        warnings.push("No scale detected; measurements may be inaccurate".to_string());
    }
    if elements.len() < 5 {
        warnings.push("Very few elements detected; check drawing quality".to_string());
    }
    if !metadata.has_standard_units() {
        warnings.push(format!("Unusual units detected: {}", metadata.units));
    }
    warnings
}

fn page_suggestions(elements: &[DrawingElement]) -> Vec<String> {
    let labels: HashSet<&str> = elements.iter().map(|e| e.element_type.as_str()).collect();
    let mut suggestions = Vec::new();

    if labels.contains("wall") && !labels.iter().any(|l| l.contains("insulation")) {
        suggestions.push("Consider adding insulation specifications".to_string());
    }
    if labels.contains("window") {
        suggestions.push("Add U-value requirements for windows".to_string());
    }
    if elements.len() > 50 {
        suggestions.push("Consider dividing into multiple drawing sheets".to_string());
    }
    suggestions
}

fn page_confidence(elements: &[DrawingElement], metadata: &DrawingMetadata) -> f64 {
    let mut confidence = 0.5;
    if elements.len() > 20 {
        confidence += 0.2;
    } else if elements.len() > 10 {
        confidence += 0.1;
    }
    if metadata.scale.is_some() {
        confidence += 0.1;
    }
    if metadata.title.is_some() {
        confidence += 0.05;
    }
    if metadata.has_standard_units() {
        confidence += 0.05;
    }
    f64::clamp(confidence, 0.0, 1.0)
}

const DRAWING_TYPE_KEYWORDS: &[(&[&str], DrawingType)] = &[
    (&["room"], DrawingType::FloorPlan),
    (&["facade"], DrawingType::Elevation),
    (&["foundation", "section"], DrawingType::Section),
    (&["detail", "connection"], DrawingType::Detail),
];

/// Drawing type from element vocabulary, checked family by family.
/// `None` when no family matches and an external classifier should decide.
pub fn infer_drawing_type(elements: &[DrawingElement]) -> Option<DrawingType> {
    let labels: Vec<String> = elements
        .iter()
        .map(|e| e.element_type.as_str().to_lowercase())
        .collect();

    DRAWING_TYPE_KEYWORDS
        .iter()
        .find(|(keywords, _)| {
            labels
                .iter()
                .any(|label| keywords.iter().any(|k| label.contains(k)))
        })
        .map(|(_, drawing_type)| *drawing_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use takeoff_common::{BoundingBox, Dimensions, ElementSource};

    fn annotated(kind: ElementType, bbox: BoundingBox, confidence: f64) -> DrawingElement {
        DrawingElement::new(kind, confidence)
            .with_bbox(bbox)
            .with_source(ElementSource::Annotation)
    }

    fn geometric(kind: ElementType, bbox: BoundingBox, confidence: f64) -> DrawingElement {
        DrawingElement::new(kind, confidence).with_bbox(bbox)
    }

    #[test]
    fn test_merge_raises_confidence_and_drops_duplicate() {
        let annotations = vec![annotated(
            ElementType::Wall,
            BoundingBox::new(0.0, 0.0, 100.0, 10.0),
            0.6,
        )];
        let geo = vec![
            geometric(ElementType::Wall, BoundingBox::new(50.0, 5.0, 100.0, 4.0), 0.8),
            geometric(ElementType::Door, BoundingBox::new(300.0, 300.0, 20.0, 20.0), 0.7),
        ];

        let merged = merge_page(annotations, geo);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source, ElementSource::Annotation);
        assert_eq!(merged[0].confidence, 0.8);
        assert_eq!(merged[1].element_type, ElementType::Door);
    }

    #[test]
    fn test_merge_never_lowers_confidence() {
        let annotations = vec![annotated(
            ElementType::Window,
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            0.9,
        )];
        let geo = vec![geometric(ElementType::Window, BoundingBox::new(5.0, 5.0, 10.0, 10.0), 0.7)];

        let merged = merge_page(annotations, geo);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].confidence, 0.9);
    }

    #[test]
    fn test_geometric_elements_do_not_dedupe_each_other() {
        let geo = vec![
            geometric(ElementType::Wall, BoundingBox::new(0.0, 0.0, 100.0, 10.0), 0.8),
            geometric(ElementType::Beam, BoundingBox::new(0.0, 0.0, 60.0, 10.0), 0.8),
        ];
        assert_eq!(merge_page(Vec::new(), geo).len(), 2);
    }

    #[test]
    fn test_unlocated_annotations_are_kept_alongside_geometry() {
        let annotations = vec![DrawingElement::new(ElementType::parse("roof"), 0.5)
            .with_source(ElementSource::Annotation)];
        let geo = vec![geometric(ElementType::Wall, BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.8)];
        assert_eq!(merge_page(annotations, geo).len(), 2);
    }

    #[test]
    fn test_default_scale_applies_only_with_dimensions() {
        let consolidator = PageConsolidator::default();
        let dimension = geometric(ElementType::Dimension, BoundingBox::new(0.0, 0.0, 60.0, 12.0), 0.5);

        let page = consolidator.analyze_page(
            1,
            Vec::new(),
            DrawingMetadata::default(),
            vec![dimension],
            Vec::new(),
        );
        assert_eq!(page.metadata.scale.as_deref(), Some("1:100"));
        assert!(!page.warnings.iter().any(|w| w.starts_with("No scale")));

        let bare = consolidator.analyze_page(2, Vec::new(), DrawingMetadata::default(), Vec::new(), Vec::new());
        assert_eq!(bare.metadata.scale, None);
        assert!(bare.warnings.iter().any(|w| w.starts_with("No scale")));
        assert!(bare.warnings.iter().any(|w| w.starts_with("Very few elements")));
    }

    #[test]
    fn test_page_confidence() {
        let consolidator = PageConsolidator::default();
        let walls: Vec<DrawingElement> = (0..12)
            .map(|i| geometric(ElementType::Wall, BoundingBox::new(i as f64 * 20.0, 0.0, 10.0, 10.0), 0.8))
            .collect();
        let metadata = DrawingMetadata {
            scale: Some("1:50".to_string()),
            title: Some("Begane grond".to_string()),
            ..Default::default()
        };

        let page = consolidator.analyze_page(1, Vec::new(), metadata, walls, Vec::new());
        assert!((page.confidence - 0.8).abs() < 1e-9);
        assert!(page.suggestions.iter().any(|s| s.contains("insulation")));
    }

    #[test]
    fn test_unusual_units_warn() {
        let consolidator = PageConsolidator::default();
        let metadata = DrawingMetadata {
            units: "inch".to_string(),
            ..Default::default()
        };
        let page = consolidator.analyze_page(1, Vec::new(), metadata, Vec::new(), Vec::new());
        assert!(page.warnings.contains(&"Unusual units detected: inch".to_string()));
        assert!((page.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_consolidate_orders_pages_and_dedupes() {
        let consolidator = PageConsolidator::default();
        let mut second = PageAnalysis::failed(2, "unreadable");
        second.warnings.push("shared".to_string());
        let first = PageAnalysis {
            page_number: 1,
            elements: vec![geometric(ElementType::Room, BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.7)],
            metadata: DrawingMetadata {
                title: Some("first".to_string()),
                ..Default::default()
            },
            warnings: vec!["shared".to_string()],
            suggestions: vec!["a".to_string(), "a".to_string()],
            confidence: 0.8,
        };

        let document = consolidator.consolidate(vec![second, first]);
        assert_eq!(document.page_count, 2);
        assert_eq!(document.metadata.title.as_deref(), Some("first"));
        assert!((document.confidence - 0.4).abs() < 1e-9);
        assert_eq!(document.warnings[0], "shared");
        assert_eq!(document.warnings.len(), 2);
        assert_eq!(document.suggestions, vec!["a".to_string()]);
        assert_eq!(document.totals.element_counts.get("room"), Some(&1));
    }

    #[test]
    fn test_totals_fall_back_to_width_times_height() {
        let elements = vec![
            DrawingElement::new(ElementType::Room, 0.7).with_dimensions(Dimensions::area(20.0)),
            DrawingElement::new(ElementType::Window, 0.7).with_dimensions(Dimensions {
                width: Some(2.0),
                height: Some(1.5),
                ..Default::default()
            }),
            DrawingElement::new(ElementType::Window, 0.7).with_dimensions(Dimensions {
                width: Some(4.0),
                ..Default::default()
            }),
            DrawingElement::new(ElementType::Wall, 0.8).with_dimensions(Dimensions::length(12.0)),
        ];

        let totals = DrawingTotals::of(&elements);
        assert_eq!(totals.total_area, 23.0);
        assert_eq!(totals.total_length, 12.0);
        assert_eq!(totals.element_counts["window"], 2);
    }

    #[test]
    fn test_drawing_type_keywords() {
        let room = vec![geometric(ElementType::Room, BoundingBox::default(), 0.7)];
        assert_eq!(infer_drawing_type(&room), Some(DrawingType::FloorPlan));

        let facade = vec![DrawingElement::new(ElementType::parse("facade_panel"), 0.5)];
        assert_eq!(infer_drawing_type(&facade), Some(DrawingType::Elevation));

        // wall_section matches the section family
        let section = vec![DrawingElement::new(ElementType::WallSection, 0.5)];
        assert_eq!(infer_drawing_type(&section), Some(DrawingType::Section));

        let detail = vec![DrawingElement::new(ElementType::DetailLine, 0.5)];
        assert_eq!(infer_drawing_type(&detail), Some(DrawingType::Detail));

        let walls = vec![DrawingElement::new(ElementType::Wall, 0.5)];
        assert_eq!(infer_drawing_type(&walls), None);
    }
}
