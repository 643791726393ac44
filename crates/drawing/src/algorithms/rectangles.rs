use image::GrayImage;
use imageproc::point::Point;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::{
    algorithms::{contour_bbox, external_contours},
    error::Result,
    traits::PrimitiveDetector,
    types::{Primitive, RectanglePrimitive},
};

/// Vertices closer than this are the same corner
const VERTEX_MERGE_DISTANCE: f64 = 2.0;

/// Quadrilaterals among the outer contours of the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ContourRectangleDetector {
    /// Polygon approximation tolerance as a fraction of the perimeter
    pub epsilon_factor: f64,
    /// Bounding-box area a rectangle must exceed
    pub min_area: f64,
}

impl Default for ContourRectangleDetector {
    fn default() -> Self {
        Self {
            epsilon_factor: 0.02,
            min_area: 100.0,
        }
    }
}

/// Corners of an approximated closed polygon, without the closing repeat or
/// near-duplicate neighbours
fn distinct_vertices(mut approx: Vec<Point<i32>>) -> Vec<Point<i32>> {
    if approx.len() > 1 && approx.first() == approx.last() {
        approx.pop();
    }

    let close = |a: &Point<i32>, b: &Point<i32>| {
        let dx = (a.x - b.x) as f64;
        let dy = (a.y - b.y) as f64;
        (dx * dx + dy * dy).sqrt() <= VERTEX_MERGE_DISTANCE
    };

    let mut vertices: Vec<Point<i32>> = Vec::with_capacity(approx.len());
    for point in approx {
        if vertices.last().is_some_and(|last| close(last, &point)) {
            continue;
        }
        vertices.push(point);
    }
    while vertices.len() > 1 && close(&vertices[0], &vertices[vertices.len() - 1]) {
        vertices.pop();
    }
    vertices
}

impl PrimitiveDetector for ContourRectangleDetector {
    fn name(&self) -> &'static str {
        "rectangles"
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Primitive>> {
        let mut rectangles = Vec::new();

        for contour in external_contours(image) {
            if contour.points.len() < 4 {
                continue;
            }
            let perimeter = imageproc::geometry::arc_length(&contour.points, true);
            let epsilon = self.epsilon_factor * perimeter;
            if epsilon <= 0.0 {
                continue;
            }

            let approx = imageproc::geometry::approximate_polygon_dp(&contour.points, epsilon, true);
            let vertices = distinct_vertices(approx);
            if vertices.len() != 4 {
                continue;
            }

            let bbox = contour_bbox(&vertices);
            if bbox.area() > self.min_area {
                rectangles.push(Primitive::Rectangle(RectanglePrimitive::from_bbox(bbox)));
            }
        }

        Ok(rectangles)
    }
}
