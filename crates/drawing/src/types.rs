use geo::EuclideanLength;
use geo_types::{Coord, Line};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoStaticStr};
use takeoff_common::BoundingBox;

/// Straight segment found by the line detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub length: f64,
    /// Direction in degrees, normalised to [0, 180)
    pub angle: f64,
    pub bbox: BoundingBox,
}

impl LineSegment {
    pub fn new(start: [f64; 2], end: [f64; 2]) -> Self {
        let line = Line::new(
            Coord { x: start[0], y: start[1] },
            Coord { x: end[0], y: end[1] },
        );
        let mut angle = line.dy().atan2(line.dx()).to_degrees();
        if angle < 0.0 {
            angle += 180.0;
        }
        if angle >= 180.0 {
            angle -= 180.0;
        }

        Self {
            start,
            end,
            length: line.euclidean_length(),
            angle,
            bbox: BoundingBox::from_corners((start[0], start[1]), (end[0], end[1])),
        }
    }

    pub fn to_geo_line(&self) -> Line<f64> {
        Line::new(
            Coord { x: self.start[0], y: self.start[1] },
            Coord { x: self.end[0], y: self.end[1] },
        )
    }
}

/// Four-cornered closed contour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectanglePrimitive {
    pub bbox: BoundingBox,
    pub area: f64,
    pub aspect_ratio: f64,
    pub center: [f64; 2],
}

impl RectanglePrimitive {
    pub fn from_bbox(bbox: BoundingBox) -> Self {
        let (cx, cy) = bbox.center();
        Self {
            bbox,
            area: bbox.area(),
            aspect_ratio: bbox.aspect_ratio(),
            center: [cx, cy],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CirclePrimitive {
    pub center: [f64; 2],
    pub radius: f64,
    pub diameter: f64,
    pub area: f64,
}

impl CirclePrimitive {
    pub fn new(center: [f64; 2], radius: f64) -> Self {
        Self {
            center,
            radius,
            diameter: radius * 2.0,
            area: std::f64::consts::PI * radius * radius,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(
            self.center[0] - self.radius,
            self.center[1] - self.radius,
            self.diameter,
            self.diameter,
        )
    }
}

/// Small blob sized like a text label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub bbox: BoundingBox,
    pub aspect_ratio: f64,
    /// Wide, short labels are usually dimension strings
    pub dimension_candidate: bool,
}

/// Output of a single geometric detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    Line(LineSegment),
    Rectangle(RectanglePrimitive),
    Circle(CirclePrimitive),
    TextRegion(TextRegion),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Line(_) => PrimitiveKind::Line,
            Primitive::Rectangle(_) => PrimitiveKind::Rectangle,
            Primitive::Circle(_) => PrimitiveKind::Circle,
            Primitive::TextRegion(_) => PrimitiveKind::TextRegion,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        match self {
            Primitive::Line(line) => line.bbox,
            Primitive::Rectangle(rect) => rect.bbox,
            Primitive::Circle(circle) => circle.bbox(),
            Primitive::TextRegion(text) => text.bbox,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrimitiveKind {
    Line,
    Rectangle,
    Circle,
    TextRegion,
}

/// Everything the detectors found on one page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionSet {
    pub primitives: Vec<Primitive>,
    /// Detector failures, one message per failed detector
    pub warnings: Vec<String>,
    pub image_width: u32,
    pub image_height: u32,
}

impl DetectionSet {
    pub fn count(&self, kind: PrimitiveKind) -> usize {
        self.primitives.iter().filter(|p| p.kind() == kind).count()
    }

    pub fn lines(&self) -> impl Iterator<Item = &LineSegment> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Line(line) => Some(line),
            _ => None,
        })
    }

    pub fn rectangles(&self) -> impl Iterator<Item = &RectanglePrimitive> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Rectangle(rect) => Some(rect),
            _ => None,
        })
    }

    pub fn circles(&self) -> impl Iterator<Item = &CirclePrimitive> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Circle(circle) => Some(circle),
            _ => None,
        })
    }

    pub fn text_regions(&self) -> impl Iterator<Item = &TextRegion> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::TextRegion(text) => Some(text),
            _ => None,
        })
    }
}
