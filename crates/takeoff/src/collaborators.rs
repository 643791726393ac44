use std::future::Future;
use std::path::PathBuf;

use takeoff_common::{DrawingElement, DrawingType};
use tracing::info;

use crate::{document::DocumentEstimate, error::Result};

/// Decides the drawing type when the element vocabulary does not
pub trait DrawingTypeClassifier: Send + Sync {
    fn classify(&self, elements: &[DrawingElement]) -> impl Future<Output = Result<DrawingType>> + Send;
}

/// Always answers the same type
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDrawingType(pub DrawingType);

impl DrawingTypeClassifier for FixedDrawingType {
    async fn classify(&self, _elements: &[DrawingElement]) -> Result<DrawingType> {
        Ok(self.0)
    }
}

/// Persists finished estimates and returns their storage id
pub trait EstimateSink: Send + Sync {
    fn store(&self, estimate: &DocumentEstimate) -> impl Future<Output = Result<String>> + Send;
}

/// Writes each estimate as pretty JSON to `<dir>/<escaped document id>.json`.
/// ASCII letters, digits and `-` are kept; every other byte becomes `_XX`
/// (hex), so distinct ids never share a file.
#[derive(Debug, Clone)]
pub struct JsonDirectorySink {
    dir: PathBuf,
}

impl JsonDirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_name(document_id: &str) -> String {
        let mut stem = String::with_capacity(document_id.len());
        for byte in document_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                stem.push(char::from(byte));
            } else {
                stem.push_str(&format!("_{byte:02X}"));
            }
        }
        format!("{stem}.json")
    }
}

impl EstimateSink for JsonDirectorySink {
    async fn store(&self, estimate: &DocumentEstimate) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(Self::file_name(&estimate.document_id));
        let json = serde_json::to_string_pretty(estimate)?;
        tokio::fs::write(&path, json).await?;
        info!("Stored estimate {} at {:?}", estimate.document_id, path);
        Ok(path.to_string_lossy().into_owned())
    }
}
