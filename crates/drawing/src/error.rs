use thiserror::Error;

#[derive(Error, Debug)]
pub enum DrawingError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Empty image ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Detector '{detector}' failed: {message}")]
    Detection { detector: String, message: String },

    #[error("Invalid detection settings: {0}")]
    InvalidSettings(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

pub type Result<T> = std::result::Result<T, DrawingError>;
