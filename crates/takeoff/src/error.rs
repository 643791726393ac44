use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Annotation of {page} failed: {message}")]
    Annotation { page: PathBuf, message: String },

    #[error("Drawing type classification failed: {0}")]
    Classifier(String),

    #[error(transparent)]
    Drawing(#[from] drawing::DrawingError),

    #[error(transparent)]
    Costing(#[from] costing::CostingError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
