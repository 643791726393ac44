//! # Takeoff Common - Shared Types
//!
//! The data model shared by the drawing analysis and costing crates:
//! bounding boxes, typed drawing elements, drawing metadata and
//! classification codes.
//!
//! ## Example
//!
//! ```rust
//! use takeoff_common::{BoundingBox, DrawingElement, ElementType};
//!
//! let wall = DrawingElement::new(ElementType::Wall, 0.8)
//!     .with_bbox(BoundingBox::new(10.0, 10.0, 300.0, 4.0));
//! let door = DrawingElement::new(ElementType::Door, 0.6)
//!     .with_bbox(BoundingBox::new(120.0, 8.0, 40.0, 8.0));
//!
//! assert!(wall.overlaps(&door));
//! ```

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Result type for shared takeoff operations
pub type Result<T> = std::result::Result<T, TakeoffError>;

/// Standard error type for shared takeoff operations
#[derive(Error, Debug)]
pub enum TakeoffError {
    #[error("Invalid classification code: {code}")]
    InvalidCode { code: String },

    #[error("Invalid value: {message}")]
    InvalidValue { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Axis-aligned box in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Box spanning two corner points, in any order
    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        let x = a.0.min(b.0);
        let y = a.1.min(b.1);
        Self::new(x, y, (a.0 - b.0).abs(), (a.1 - b.1).abs())
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Width over height, 0 for a degenerate box
    pub fn aspect_ratio(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Closed-interval intersection test. Boxes that only touch overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        !(self.x + self.width < other.x
            || other.x + other.width < self.x
            || self.y + self.height < other.y
            || other.y + other.height < self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// Construction element tag.
///
/// The geometric classifier only produces the known variants. Elements coming
/// from the annotation service may carry any label, which is kept verbatim in
/// [`ElementType::Other`] so that keyword-based code mapping still sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementType {
    Wall,
    WallSection,
    Beam,
    DetailLine,
    Column,
    ColumnCircular,
    Hole,
    Opening,
    Window,
    Door,
    Room,
    Dimension,
    Annotation,
    Unknown,
    Other(String),
}

impl ElementType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Wall => "wall",
            Self::WallSection => "wall_section",
            Self::Beam => "beam",
            Self::DetailLine => "detail_line",
            Self::Column => "column",
            Self::ColumnCircular => "column_circular",
            Self::Hole => "hole",
            Self::Opening => "opening",
            Self::Window => "window",
            Self::Door => "door",
            Self::Room => "room",
            Self::Dimension => "dimension",
            Self::Annotation => "annotation",
            Self::Unknown => "unknown",
            Self::Other(label) => label,
        }
    }

    /// Parse a label, normalising case and surrounding whitespace.
    /// Unrecognised labels become [`ElementType::Other`].
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "wall" => Self::Wall,
            "wall_section" => Self::WallSection,
            "beam" => Self::Beam,
            "detail_line" => Self::DetailLine,
            "column" => Self::Column,
            "column_circular" => Self::ColumnCircular,
            "hole" => Self::Hole,
            "opening" => Self::Opening,
            "window" => Self::Window,
            "door" => Self::Door,
            "room" => Self::Room,
            "dimension" => Self::Dimension,
            "annotation" => Self::Annotation,
            "" | "unknown" => Self::Unknown,
            _ => Self::Other(normalized),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for ElementType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ElementType> for String {
    fn from(value: ElementType) -> Self {
        value.as_str().to_string()
    }
}

impl JsonSchema for ElementType {
    fn schema_name() -> String {
        "ElementType".to_string()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(generator)
    }
}

/// Semantic measures of an element. All values of one element share a unit
/// system (pixels before calibration, millimetres after).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Dimensions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Dimensions {
    pub fn length(length: f64) -> Self {
        Self { length: Some(length), ..Default::default() }
    }

    pub fn area(area: f64) -> Self {
        Self { area: Some(area), ..Default::default() }
    }

    pub fn rect(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            area: Some(width * height),
            ..Default::default()
        }
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        [self.length, self.area, self.volume, self.width, self.height]
            .into_iter()
            .flatten()
    }

    /// True when any present measure is negative, NaN or infinite
    pub fn is_malformed(&self) -> bool {
        self.values().any(|v| !v.is_finite() || v < 0.0)
    }
}

/// Where an element was first observed
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ElementSource {
    Annotation,
    Geometry,
}

/// Hierarchical `chapter.subcode` cost classification code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClassificationCode(String);

impl ClassificationCode {
    /// Code assigned when no mapping rule matches
    pub const UNCATEGORIZED: &'static str = "99.9";

    pub fn new(code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() || trimmed.split('.').any(|part| part.is_empty()) {
            return Err(TakeoffError::InvalidCode { code });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn uncategorized() -> Self {
        Self(Self::UNCATEGORIZED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix before the first dot, or the whole code
    pub fn chapter(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    pub fn is_uncategorized(&self) -> bool {
        self.0 == Self::UNCATEGORIZED
    }
}

impl fmt::Display for ClassificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClassificationCode {
    type Err = TakeoffError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// A detected or annotated construction feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingElement {
    pub element_type: ElementType,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
    /// Explicit count supplied by the annotation service
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub material: Option<String>,
    pub confidence: f64,
    pub source: ElementSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ClassificationCode>,
}

impl DrawingElement {
    pub fn new(element_type: ElementType, confidence: f64) -> Self {
        Self {
            element_type,
            bbox: None,
            dimensions: None,
            quantity: None,
            material: None,
            confidence: clamp_confidence(confidence),
            source: ElementSource::Geometry,
            code: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_source(mut self, source: ElementSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_code(mut self, code: ClassificationCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Elements without a location never overlap anything
    pub fn overlaps(&self, other: &DrawingElement) -> bool {
        match (&self.bbox, &other.bbox) {
            (Some(a), Some(b)) => a.overlaps(b),
            _ => false,
        }
    }

    /// Raise confidence to `other` if it is higher. Never lowers it.
    pub fn absorb_confidence(&mut self, other: f64) {
        self.confidence = self.confidence.max(clamp_confidence(other));
    }
}

/// Clamp into [0, 1], mapping NaN to 0
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Kind of drawing sheet
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DrawingType {
    FloorPlan,
    Elevation,
    Section,
    Detail,
    #[default]
    Unknown,
}

/// Per-page (and, after consolidation, per-document) drawing metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DrawingMetadata {
    #[serde(default)]
    pub drawing_type: DrawingType,
    /// Scale notation such as `1:100`
    #[serde(default)]
    pub scale: Option<String>,
    #[serde(default = "default_units")]
    pub units: String,
    #[serde(default)]
    pub orientation: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub software: Option<String>,
}

fn default_units() -> String {
    "mm".to_string()
}

impl Default for DrawingMetadata {
    fn default() -> Self {
        Self {
            drawing_type: DrawingType::Unknown,
            scale: None,
            units: default_units(),
            orientation: None,
            author: None,
            title: None,
            software: None,
        }
    }
}

impl DrawingMetadata {
    /// Units the pipeline knows how to interpret
    pub fn has_standard_units(&self) -> bool {
        matches!(self.units.as_str(), "mm" | "cm" | "m")
    }
}
