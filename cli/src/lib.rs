use std::fs;
use std::path::{Path, PathBuf};

use costing::{AggregatorConfig, CostingError, PriceTable, ProjectContext, RateCard, ReportSummary};
use drawing::DetectionSettings;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use takeoff::{DocumentRequest, DEFAULT_MAX_CONCURRENT_DOCUMENTS};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Costing(#[from] CostingError),
    #[error("Document {0} has no pages")]
    NoPages(String),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Read a TOML or JSON file, chosen by extension
pub fn load_by_extension<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, CliError> {
    let path_ref = path.as_ref();
    match path_ref.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(toml::from_str(&fs::read_to_string(path_ref)?)?),
        Some("json") => Ok(serde_json::from_str(&fs::read_to_string(path_ref)?)?),
        _ => Err(CliError::UnsupportedFileFormat),
    }
}

/// Where annotation elements come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationMode {
    /// Geometry only
    None,
    /// `<page>.annotations.json` next to each page image
    #[default]
    Sidecar,
}

/// One drawing set: an id, its page images in page order and an optional
/// summary of an accompanying report
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DocumentEntry {
    pub id: String,
    pub pages: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportSummary>,
}

fn default_max_concurrent_documents() -> usize {
    DEFAULT_MAX_CONCURRENT_DOCUMENTS
}

/// Batch estimation configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BatchConfig {
    pub documents: Vec<DocumentEntry>,
    /// Estimates are written here as `<document id>.json`
    pub output_dir: PathBuf,
    #[serde(default = "default_max_concurrent_documents")]
    pub max_concurrent_documents: usize,
    /// Price table file (.toml or .json); the built-in STABU excerpt otherwise
    #[serde(default)]
    pub price_table: Option<PathBuf>,
    /// Project context file (.toml or .json)
    #[serde(default)]
    pub context: Option<PathBuf>,
    #[serde(default)]
    pub annotations: AnnotationMode,
    /// Write per-page GeoJSON of the detected elements here
    #[serde(default)]
    pub geojson_dir: Option<PathBuf>,
    #[serde(default)]
    pub detection: DetectionSettings,
    #[serde(default)]
    pub rates: RateCard,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
}

impl BatchConfig {
    /// Load BatchConfig configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load BatchConfig configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self, CliError> {
        let config: BatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load BatchConfig configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load BatchConfig configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self, CliError> {
        let config: BatchConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    /// Convert BatchConfig to TOML string
    pub fn to_toml(&self) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    /// Convert BatchConfig to JSON string
    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    fn validate(&self) -> Result<(), CliError> {
        match self.documents.iter().find(|d| d.pages.is_empty()) {
            Some(document) => Err(CliError::NoPages(document.id.clone())),
            None => Ok(()),
        }
    }

    pub fn requests(&self) -> Vec<DocumentRequest> {
        self.documents
            .iter()
            .map(|d| {
                let request = DocumentRequest::new(d.id.clone(), d.pages.clone());
                match &d.report {
                    Some(report) => request.with_report(report.clone()),
                    None => request,
                }
            })
            .collect()
    }

    pub fn load_price_table(&self) -> Result<PriceTable, CliError> {
        load_price_table(self.price_table.as_deref())
    }

    pub fn load_context(&self) -> Result<ProjectContext, CliError> {
        load_context(self.context.as_deref())
    }
}

pub fn load_price_table(path: Option<&Path>) -> Result<PriceTable, CliError> {
    match path {
        Some(path) => Ok(PriceTable::from_file(path)?),
        None => Ok(PriceTable::default()),
    }
}

pub fn load_context(path: Option<&Path>) -> Result<ProjectContext, CliError> {
    match path {
        Some(path) => load_by_extension(path),
        None => Ok(ProjectContext::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costing::Complexity;

    const BATCH_TOML: &str = r#"
        output_dir = "estimates"
        max_concurrent_documents = 2

        [[documents]]
        id = "woning"
        pages = ["tekeningen/begane_grond.png", "tekeningen/verdieping.png"]

        [[documents]]
        id = "garage"
        pages = ["tekeningen/garage.png"]
        report = { report_type = "bodemonderzoek", confidence = 0.7 }

        [detection.detectors]
        disabled = ["circle"]

        [aggregator]
        vat_percentage = "0.09"
    "#;

    #[test]
    fn test_batch_config_from_toml() {
        let config = BatchConfig::from_toml(BATCH_TOML).expect("Should parse batch config");

        assert_eq!(config.documents.len(), 2);
        assert_eq!(config.max_concurrent_documents, 2);
        assert_eq!(config.annotations, AnnotationMode::Sidecar);
        assert_eq!(config.aggregator.vat_percentage.to_string(), "0.09");
        assert_eq!(config.detection.default_scale.as_deref(), Some("1:100"));

        let requests = config.requests();
        assert_eq!(requests[0].document_id, "woning");
        assert_eq!(requests[0].pages.len(), 2);
        assert!(requests[0].report.is_none());
        let report = requests[1].report.as_ref().expect("Should carry the report summary");
        assert_eq!(report.report_type, "bodemonderzoek");
    }

    #[test]
    fn test_batch_config_defaults_and_round_trip() {
        let config = BatchConfig::from_json(
            r#"{"output_dir": "out", "documents": [{"id": "a", "pages": ["a.png"]}]}"#,
        )
        .expect("Should parse batch config");
        assert_eq!(config.max_concurrent_documents, 4);
        assert!(config.price_table.is_none());

        let toml = config.to_toml().expect("Should serialize to TOML");
        assert_eq!(BatchConfig::from_toml(&toml).expect("Should parse TOML"), config);
    }

    #[test]
    fn test_documents_need_pages() {
        let result = BatchConfig::from_json(r#"{"output_dir": "out", "documents": [{"id": "leeg", "pages": []}]}"#);
        assert!(matches!(result, Err(CliError::NoPages(id)) if id == "leeg"));
    }

    #[test]
    fn test_load_context_and_unsupported_formats() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let path = dir.path().join("project.json");
        fs::write(&path, r#"{"project_name": "Brug", "complexity": "high"}"#).expect("Should write context");

        let context = load_context(Some(&path)).expect("Should load context");
        assert_eq!(context.project_name, "Brug");
        assert_eq!(context.complexity, Complexity::High);
        assert_eq!(load_context(None).expect("Default context").location, "randstad");

        assert!(matches!(
            BatchConfig::from_file(dir.path().join("batch.yaml")),
            Err(CliError::UnsupportedFileFormat)
        ));
    }
}
