use thiserror::Error;

#[derive(Error, Debug)]
pub enum CostingError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Takeoff(#[from] takeoff_common::TakeoffError),
    #[error("Price table entry {code} has a negative price")]
    NegativePrice { code: String },
    #[error("Duplicate price table entry {code}")]
    DuplicateCode { code: String },
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

pub type Result<T> = std::result::Result<T, CostingError>;
