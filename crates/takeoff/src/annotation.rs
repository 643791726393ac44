//! Elements supplied by an external annotation service.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use takeoff_common::{
    BoundingBox, Dimensions, DrawingElement, DrawingMetadata, ElementSource, ElementType,
};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Confidence assumed when the service does not report one
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// One element as reported by the annotation service. Every field but the
/// type is optional; the service is treated as untrusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub location: Option<BoundingBox>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl AnnotationRecord {
    pub fn into_element(self) -> DrawingElement {
        let mut element = DrawingElement::new(
            ElementType::parse(&self.element_type),
            self.confidence.unwrap_or(DEFAULT_CONFIDENCE),
        )
        .with_source(ElementSource::Annotation);

        // a location with NaN or infinite parts never overlaps anything
        element.bbox = self.location.filter(BoundingBox::is_finite);
        element.dimensions = self.dimensions;
        element.material = self.material.filter(|m| !m.trim().is_empty());
        element.quantity = self.quantity;
        element
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationResponse {
    #[serde(default)]
    pub elements: Vec<AnnotationRecord>,
    #[serde(default)]
    pub metadata: DrawingMetadata,
}

impl AnnotationResponse {
    pub fn into_parts(self) -> (Vec<DrawingElement>, DrawingMetadata) {
        let elements = self
            .elements
            .into_iter()
            .map(AnnotationRecord::into_element)
            .collect();
        (elements, self.metadata)
    }
}

/// Vision or language-model service that reads a page image
pub trait AnnotationSource: Send + Sync {
    fn annotate(&self, page: &Path) -> impl Future<Output = Result<AnnotationResponse>> + Send;
}

/// Geometry only
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnnotations;

impl AnnotationSource for NoAnnotations {
    async fn annotate(&self, _page: &Path) -> Result<AnnotationResponse> {
        Ok(AnnotationResponse::default())
    }
}

/// Reads `<page stem>.annotations.json` next to each page image. A missing
/// file means no annotations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarAnnotations;

impl SidecarAnnotations {
    pub fn sidecar_path(page: &Path) -> PathBuf {
        page.with_extension("annotations.json")
    }
}

impl AnnotationSource for SidecarAnnotations {
    async fn annotate(&self, page: &Path) -> Result<AnnotationResponse> {
        let sidecar = Self::sidecar_path(page);
        let content = match tokio::fs::read_to_string(&sidecar).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No annotations for {:?}", page);
                return Ok(AnnotationResponse::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| PipelineError::Annotation {
            page: page.to_path_buf(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults() {
        let response: AnnotationResponse = serde_json::from_str(
            r#"{
                "elements": [
                    {"type": "wall", "location": {"x": 0, "y": 0, "width": 100, "height": 5}},
                    {"type": "Kozijn", "confidence": 1.7, "quantity": 4, "material": "hout"},
                    {"type": "", "material": "  "}
                ],
                "metadata": {"scale": "1:50", "drawing_type": "floor_plan"}
            }"#,
        )
        .expect("Should parse response");

        let (elements, metadata) = response.into_parts();
        assert_eq!(metadata.scale.as_deref(), Some("1:50"));
        assert_eq!(metadata.units, "mm");

        assert_eq!(elements[0].element_type, ElementType::Wall);
        assert_eq!(elements[0].confidence, 0.5);
        assert_eq!(elements[0].source, ElementSource::Annotation);
        assert!(elements[0].bbox.is_some());

        assert_eq!(elements[1].element_type, ElementType::Other("kozijn".to_string()));
        assert_eq!(elements[1].confidence, 1.0);
        assert_eq!(elements[1].quantity, Some(4.0));
        assert!(elements[1].bbox.is_none());

        assert_eq!(elements[2].element_type, ElementType::Unknown);
        assert!(elements[2].material.is_none());
    }

    #[tokio::test]
    async fn test_sidecar_annotations() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let page = dir.path().join("plan.png");

        let empty = SidecarAnnotations.annotate(&page).await.expect("Missing sidecar is fine");
        assert!(empty.elements.is_empty());

        std::fs::write(
            dir.path().join("plan.annotations.json"),
            r#"{"elements": [{"type": "door", "confidence": 0.9}]}"#,
        )
        .expect("Should write sidecar");
        let response = SidecarAnnotations.annotate(&page).await.expect("Should read sidecar");
        assert_eq!(response.elements.len(), 1);

        std::fs::write(dir.path().join("plan.annotations.json"), "{not json").expect("Should write sidecar");
        assert!(matches!(
            SidecarAnnotations.annotate(&page).await,
            Err(PipelineError::Annotation { .. })
        ));
    }
}
