//! One document, from page images to a cost estimate.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use costing::{CostAnalysisResult, CostAnalyzer, DrawingSummary, ReportSummary};
use drawing::{infer_drawing_type, DocumentAnalysis, PageAnalysis, PageAnalyzer, PageConsolidator};
use serde::{Deserialize, Serialize};
use takeoff_common::{DrawingType, ElementType};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::{annotation::AnnotationSource, collaborators::DrawingTypeClassifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No page image could be decoded
    ImageLoad,
    /// Pages loaded but nothing usable was found on them
    NoUsableElements,
    /// The document task panicked
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStatus {
    Completed,
    /// Some pages failed; the estimate covers the rest
    Degraded,
    Failed(FailureReason),
    Cancelled,
}

/// A document to estimate: its id, page images in page order and an
/// optional summary of an accompanying report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRequest {
    pub document_id: String,
    pub pages: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportSummary>,
}

impl DocumentRequest {
    pub fn new(document_id: impl Into<String>, pages: Vec<PathBuf>) -> Self {
        Self {
            document_id: document_id.into(),
            pages,
            report: None,
        }
    }

    pub fn with_report(mut self, report: ReportSummary) -> Self {
        self.report = Some(report);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentEstimate {
    pub document_id: String,
    pub status: EstimateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing: Option<DocumentAnalysis>,
    pub cost: CostAnalysisResult,
    pub warnings: Vec<String>,
}

impl DocumentEstimate {
    pub fn is_usable(&self) -> bool {
        matches!(self.status, EstimateStatus::Completed | EstimateStatus::Degraded)
    }
}

struct PageOutcome {
    analysis: PageAnalysis,
    loaded: bool,
}

/// Runs the drawing and costing stages for a document. Pages are analysed
/// concurrently; decoding and detection run on the blocking pool.
pub struct DocumentPipeline<A, C> {
    analyzer: Arc<PageAnalyzer>,
    consolidator: PageConsolidator,
    annotations: Arc<A>,
    classifier: C,
    costing: CostAnalyzer,
    geojson_dir: Option<PathBuf>,
}

impl<A, C> DocumentPipeline<A, C>
where
    A: AnnotationSource + 'static,
    C: DrawingTypeClassifier + 'static,
{
    pub fn new(
        analyzer: PageAnalyzer,
        consolidator: PageConsolidator,
        annotations: A,
        classifier: C,
        costing: CostAnalyzer,
    ) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            consolidator,
            annotations: Arc::new(annotations),
            classifier,
            costing,
            geojson_dir: None,
        }
    }

    /// Also write the geometric elements of every page as GeoJSON
    pub fn with_geojson_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.geojson_dir = Some(dir.into());
        self
    }

    pub fn costing(&self) -> &CostAnalyzer {
        &self.costing
    }

    /// A zero-cost estimate with the given status
    pub fn unpriced_estimate(
        &self,
        document_id: &str,
        status: EstimateStatus,
        warnings: Vec<String>,
    ) -> DocumentEstimate {
        DocumentEstimate {
            document_id: document_id.to_string(),
            status,
            drawing: None,
            cost: CostAnalysisResult::empty(self.costing.context(), self.costing.config(), warnings.clone()),
            warnings,
        }
    }

    fn analyze_page_task(
        &self,
        document_id: &str,
        page_number: u32,
        path: PathBuf,
    ) -> impl Future<Output = PageOutcome> + Send + use<A, C> {
        let analyzer = Arc::clone(&self.analyzer);
        let annotations = Arc::clone(&self.annotations);
        let consolidator = self.consolidator.clone();
        let geojson_path = self
            .geojson_dir
            .as_ref()
            .map(|dir| dir.join(format!("{document_id}_page{page_number}.geojson")));

        async move {
            let image_path = path.clone();
            let geometry = tokio::task::spawn_blocking(move || {
                let mut geometry = analyzer.analyze_path(&image_path)?;
                if let Some(target) = geojson_path {
                    if let Err(e) = geometry.save_geojson(&target) {
                        geometry.warnings.push(format!("GeoJSON export to {:?} failed: {}", target, e));
                    }
                }
                Ok::<_, drawing::DrawingError>(geometry)
            });
            let (geometry, annotation) = tokio::join!(geometry, annotations.annotate(&path));

            let geometry = match geometry {
                Ok(Ok(geometry)) => geometry,
                Ok(Err(e)) => {
                    warn!("Page {} ({:?}) could not be analysed: {}", page_number, path, e);
                    return PageOutcome { analysis: PageAnalysis::failed(page_number, e), loaded: false };
                }
                Err(e) => {
                    warn!("Page {} ({:?}) analysis panicked: {}", page_number, path, e);
                    return PageOutcome { analysis: PageAnalysis::failed(page_number, e), loaded: false };
                }
            };

            let mut warnings = geometry.warnings;
            let (elements, metadata) = match annotation {
                Ok(response) => response.into_parts(),
                Err(e) => {
                    warn!("Annotation of page {} failed: {}", page_number, e);
                    warnings.push(format!("Annotation of page {page_number} failed: {e}"));
                    (Vec::new(), Default::default())
                }
            };

            PageOutcome {
                analysis: consolidator.analyze_page(page_number, elements, metadata, geometry.elements, warnings),
                loaded: true,
            }
        }
    }

    /// Analyse every page concurrently. Returns the page analyses in page
    /// order and how many pages could be decoded.
    pub async fn analyze_pages(&self, document_id: &str, pages: &[PathBuf]) -> (Vec<PageAnalysis>, usize) {
        let mut tasks = JoinSet::new();
        for (index, path) in pages.iter().enumerate() {
            let page_number = index as u32 + 1;
            let page = tokio::spawn(self.analyze_page_task(document_id, page_number, path.clone()));
            // a panicking page still reports as a failed page
            tasks.spawn(async move {
                match page.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("Page {} task failed: {}", page_number, e);
                        PageOutcome {
                            analysis: PageAnalysis::failed(page_number, format!("page task failed: {e}")),
                            loaded: false,
                        }
                    }
                }
            });
        }

        let mut analyses = Vec::with_capacity(pages.len());
        let mut loaded = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    loaded += usize::from(outcome.loaded);
                    analyses.push(outcome.analysis);
                }
                Err(e) => warn!("A page task of {} failed: {}", document_id, e),
            }
        }
        analyses.sort_by_key(|page| page.page_number);
        (analyses, loaded)
    }

    async fn drawing_type(&self, document: &DocumentAnalysis, warnings: &mut Vec<String>) -> DrawingType {
        if let Some(drawing_type) = infer_drawing_type(&document.elements) {
            return drawing_type;
        }
        match self.classifier.classify(&document.elements).await {
            Ok(drawing_type) => drawing_type,
            Err(e) => {
                warn!("Drawing type classification failed: {}", e);
                warnings.push(format!("Drawing type unknown: {e}"));
                DrawingType::Unknown
            }
        }
    }

    pub async fn run(&self, request: &DocumentRequest) -> DocumentEstimate {
        let id = request.document_id.as_str();
        let (pages, loaded) = self.analyze_pages(id, &request.pages).await;
        let failed_pages = request.pages.len().saturating_sub(loaded);

        if loaded == 0 {
            let mut warnings: Vec<String> = pages.into_iter().flat_map(|p| p.warnings).collect();
            warnings.push(format!("No page of {id} could be loaded"));
            return self.unpriced_estimate(id, EstimateStatus::Failed(FailureReason::ImageLoad), warnings);
        }

        let mut document = self.consolidator.consolidate(pages);
        if !document.elements.iter().any(|e| e.element_type != ElementType::Unknown) {
            let mut warnings = document.warnings;
            warnings.push(format!("No usable elements found in {id}"));
            return self.unpriced_estimate(id, EstimateStatus::Failed(FailureReason::NoUsableElements), warnings);
        }

        let mut warnings = document.warnings.clone();
        let drawing_type = self.drawing_type(&document, &mut warnings).await;
        document.metadata.drawing_type = drawing_type;
        document.warnings = warnings.clone();

        let summary = DrawingSummary {
            drawing_type,
            confidence: document.confidence,
            element_count: document.elements.len(),
        };
        let cost = self.costing.analyze(&document.elements, Some(&summary), request.report.as_ref());
        let status = if failed_pages > 0 { EstimateStatus::Degraded } else { EstimateStatus::Completed };
        info!(
            "Estimated {} ({} pages, {} elements, {}): {} {}",
            id,
            document.page_count,
            document.elements.len(),
            drawing_type,
            cost.total_incl_vat(),
            cost.currency
        );

        DocumentEstimate {
            document_id: id.to_string(),
            status,
            drawing: Some(document),
            cost,
            warnings,
        }
    }
}
