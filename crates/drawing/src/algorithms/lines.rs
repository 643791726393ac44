use image::GrayImage;
use imageproc::hough::{LineDetectionOptions, PolarLine};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::{
    error::Result,
    traits::PrimitiveDetector,
    types::{LineSegment, Primitive},
};

/// Line segments from a Hough transform over Canny edges.
///
/// Each accumulator peak is an infinite line; the line is walked across the
/// edge map and cut into segments wherever the edge trace breaks for longer
/// than `max_line_gap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct HoughLineDetector {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Minimum accumulator votes for a line
    pub vote_threshold: u32,
    /// Non-maximum suppression radius in accumulator space
    pub suppression_radius: u32,
    pub min_line_length: f64,
    pub max_line_gap: f64,
}

impl Default for HoughLineDetector {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            vote_threshold: 50,
            suppression_radius: 8,
            min_line_length: 30.0,
            max_line_gap: 10.0,
        }
    }
}

impl HoughLineDetector {
    /// Split one polar line into the segments supported by edge pixels
    pub fn trace_segments(&self, edges: &GrayImage, line: &PolarLine) -> Vec<LineSegment> {
        let theta = (line.angle_in_degrees as f64).to_radians();
        let (sin, cos) = theta.sin_cos();
        let r = line.r as f64;
        let base = (r * cos, r * sin);
        let direction = (-sin, cos);
        let normal = (cos, sin);

        let (width, height) = edges.dimensions();
        let reach = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt().ceil() as i64;

        let point_at = |t: f64| (base.0 + t * direction.0, base.1 + t * direction.1);
        let is_edge = |x: f64, y: f64| {
            let (px, py) = (x.round(), y.round());
            px >= 0.0
                && py >= 0.0
                && (px as u32) < width
                && (py as u32) < height
                && edges.get_pixel(px as u32, py as u32)[0] > 0
        };

        let mut segments = Vec::new();
        let mut run: Option<(f64, f64)> = None;
        let close = |start: f64, end: f64, segments: &mut Vec<LineSegment>| {
            if end - start >= self.min_line_length {
                let (x0, y0) = point_at(start);
                let (x1, y1) = point_at(end);
                segments.push(LineSegment::new([x0.round(), y0.round()], [x1.round(), y1.round()]));
            }
        };

        for step in -reach..=reach {
            let t = step as f64;
            let (x, y) = point_at(t);
            let hit = [-1.0, 0.0, 1.0]
                .iter()
                .any(|offset| is_edge(x + offset * normal.0, y + offset * normal.1));
            if !hit {
                continue;
            }

            run = match run {
                None => Some((t, t)),
                Some((start, last)) if t - last > self.max_line_gap => {
                    close(start, last, &mut segments);
                    Some((t, t))
                }
                Some((start, _)) => Some((start, t)),
            };
        }

        if let Some((start, last)) = run {
            close(start, last, &mut segments);
        }

        segments
    }
}

impl PrimitiveDetector for HoughLineDetector {
    fn name(&self) -> &'static str {
        "lines"
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Primitive>> {
        let edges = imageproc::edges::canny(image, self.canny_low, self.canny_high);
        let options = LineDetectionOptions {
            vote_threshold: self.vote_threshold,
            suppression_radius: self.suppression_radius,
        };
        let polar_lines = imageproc::hough::detect_lines(&edges, options);
        debug!("Hough transform found {} candidate lines", polar_lines.len());

        let segments = polar_lines
            .iter()
            .flat_map(|line| self.trace_segments(&edges, line))
            .map(Primitive::Line)
            .collect();

        Ok(segments)
    }
}
