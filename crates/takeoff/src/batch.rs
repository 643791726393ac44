//! Many documents with bounded concurrency and cooperative cancellation.

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::{
    annotation::AnnotationSource,
    collaborators::DrawingTypeClassifier,
    document::{DocumentEstimate, DocumentPipeline, DocumentRequest, EstimateStatus, FailureReason},
};

pub const DEFAULT_MAX_CONCURRENT_DOCUMENTS: usize = 4;

/// Stops documents that have not started yet
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

fn is_set(receiver: &watch::Receiver<bool>) -> bool {
    *receiver.borrow()
}

pub struct BatchRunner<A, C> {
    pipeline: Arc<DocumentPipeline<A, C>>,
    max_concurrent_documents: usize,
    cancel: CancelHandle,
}

impl<A, C> BatchRunner<A, C>
where
    A: AnnotationSource + 'static,
    C: DrawingTypeClassifier + 'static,
{
    pub fn new(pipeline: DocumentPipeline<A, C>) -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            pipeline: Arc::new(pipeline),
            max_concurrent_documents: DEFAULT_MAX_CONCURRENT_DOCUMENTS,
            cancel: CancelHandle { sender },
        }
    }

    /// At least one document always runs
    pub fn with_max_concurrent_documents(mut self, limit: usize) -> Self {
        self.max_concurrent_documents = limit.max(1);
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Estimate every document. Results come back in request order. After
    /// cancellation, documents still waiting for a slot and documents that
    /// finish afterwards are reported as cancelled.
    pub async fn run(&self, requests: Vec<DocumentRequest>) -> Vec<DocumentEstimate> {
        let total = requests.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_documents));
        let mut tasks = JoinSet::new();
        info!(
            "Estimating {} documents, at most {} at a time",
            total, self.max_concurrent_documents
        );

        for (index, request) in requests.into_iter().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&semaphore);
            let mut cancelled = self.cancel.sender.subscribe();

            tasks.spawn(async move {
                let cancelled_estimate = |pipeline: &DocumentPipeline<A, C>, id: &str| {
                    pipeline.unpriced_estimate(id, EstimateStatus::Cancelled, vec!["Batch was cancelled".to_string()])
                };

                let permit = tokio::select! {
                    biased;
                    _ = async {
                        let _ = cancelled.wait_for(|c| *c).await;
                    } => None,
                    permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return (index, cancelled_estimate(&pipeline, &request.document_id));
                };
                if is_set(&cancelled) {
                    return (index, cancelled_estimate(&pipeline, &request.document_id));
                }

                // a panic inside one document must not take the batch down
                let document_id = request.document_id.clone();
                let worker = Arc::clone(&pipeline);
                let estimate = match tokio::spawn(async move { worker.run(&request).await }).await {
                    Ok(estimate) => estimate,
                    Err(e) => {
                        warn!("Document {} failed: {}", document_id, e);
                        pipeline.unpriced_estimate(
                            &document_id,
                            EstimateStatus::Failed(FailureReason::Internal),
                            vec![format!("Document task failed: {e}")],
                        )
                    }
                };

                if is_set(&cancelled) {
                    (index, cancelled_estimate(&pipeline, &document_id))
                } else {
                    (index, estimate)
                }
            });
        }

        let mut results: Vec<Option<DocumentEstimate>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, estimate)) => results[index] = Some(estimate),
                Err(e) => warn!("A batch task failed: {}", e),
            }
        }

        let estimates: Vec<DocumentEstimate> = results.into_iter().flatten().collect();
        let usable = estimates.iter().filter(|e| e.is_usable()).count();
        info!("Batch finished: {} of {} documents estimated", usable, total);
        estimates
    }
}
