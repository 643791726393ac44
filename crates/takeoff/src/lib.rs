//! # Takeoff Orchestration
//!
//! Wires the drawing and costing crates into a document pipeline. Pages of a
//! document are analysed concurrently and merged with whatever the annotation
//! service reports; the consolidated elements are priced into a cost
//! estimate. A batch runner estimates many documents with a concurrency cap
//! and cooperative cancellation.
//!
//! ```rust,no_run
//! use takeoff::{BatchRunner, DocumentPipeline, DocumentRequest, FixedDrawingType, SidecarAnnotations};
//!
//! # async fn run() {
//! let pipeline = DocumentPipeline::new(
//!     drawing::PageAnalyzer::default(),
//!     drawing::PageConsolidator::default(),
//!     SidecarAnnotations,
//!     FixedDrawingType::default(),
//!     costing::CostAnalyzer::default(),
//! );
//! let runner = BatchRunner::new(pipeline).with_max_concurrent_documents(2);
//! let estimates = runner
//!     .run(vec![DocumentRequest::new("woning", vec!["begane_grond.png".into()])])
//!     .await;
//! # }
//! ```

pub mod error;
pub mod annotation;
pub mod collaborators;
pub mod document;
pub mod batch;

pub use error::{PipelineError, Result};
pub use annotation::{AnnotationRecord, AnnotationResponse, AnnotationSource, NoAnnotations, SidecarAnnotations};
pub use collaborators::{DrawingTypeClassifier, EstimateSink, FixedDrawingType, JsonDirectorySink};
pub use document::{DocumentEstimate, DocumentPipeline, DocumentRequest, EstimateStatus, FailureReason};
pub use batch::{BatchRunner, CancelHandle, DEFAULT_MAX_CONCURRENT_DOCUMENTS};
