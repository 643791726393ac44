use image::GrayImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::{
    error::Result,
    traits::PrimitiveDetector,
    types::{CirclePrimitive, Primitive},
};

/// Gradient Hough transform for circles.
///
/// Every edge pixel votes for candidate centres along its gradient direction,
/// on both sides, for each radius in range. Peaks are then checked for rim
/// support: enough edge pixels at one distance from the centre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GradientCircleDetector {
    pub canny_low: f32,
    pub canny_high: f32,
    pub min_radius: u32,
    pub max_radius: u32,
    /// Minimum distance between two accepted centres
    pub min_center_distance: f64,
    /// Votes (3x3 neighbourhood) a centre needs
    pub accumulator_threshold: u32,
    /// Fraction of the circumference that must be covered by edge pixels
    pub min_rim_support: f64,
}

impl Default for GradientCircleDetector {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            min_radius: 5,
            max_radius: 100,
            min_center_distance: 20.0,
            accumulator_threshold: 30,
            min_rim_support: 0.3,
        }
    }
}

struct EdgePoint {
    x: f64,
    y: f64,
    ux: f64,
    uy: f64,
}

impl GradientCircleDetector {
    fn edge_points(&self, image: &GrayImage) -> Vec<EdgePoint> {
        let edges = imageproc::edges::canny(image, self.canny_low, self.canny_high);
        let gx = imageproc::gradients::horizontal_sobel(image);
        let gy = imageproc::gradients::vertical_sobel(image);

        edges
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 0)
            .filter_map(|(x, y, _)| {
                let dx = gx.get_pixel(x, y)[0] as f64;
                let dy = gy.get_pixel(x, y)[0] as f64;
                let magnitude = dx.hypot(dy);
                (magnitude > f64::EPSILON).then(|| EdgePoint {
                    x: x as f64,
                    y: y as f64,
                    ux: dx / magnitude,
                    uy: dy / magnitude,
                })
            })
            .collect()
    }

    /// Edge points within `reach` of a centre on both axes. `points` is in
    /// row-major order, as `edge_points` yields it.
    fn nearby_points<'a>(
        points: &'a [EdgePoint],
        cx: f64,
        cy: f64,
        reach: f64,
    ) -> impl Iterator<Item = &'a EdgePoint> + 'a {
        let start = points.partition_point(|p| p.y < cy - reach);
        let end = points.partition_point(|p| p.y <= cy + reach);
        points[start..end.max(start)]
            .iter()
            .filter(move |p| (p.x - cx).abs() <= reach)
    }

    /// Best radius around a centre and its rim support ratio
    fn fit_radius(&self, points: &[EdgePoint], cx: f64, cy: f64) -> Option<(f64, f64)> {
        let bins = self.max_radius as usize + 2;
        let mut histogram = vec![0u32; bins];
        let reach = self.max_radius as f64 + 1.0;
        for point in Self::nearby_points(points, cx, cy, reach) {
            let distance = (point.x - cx).hypot(point.y - cy).round() as usize;
            if distance >= self.min_radius as usize && distance <= self.max_radius as usize {
                histogram[distance] += 1;
            }
        }

        (self.min_radius as usize..=self.max_radius as usize)
            .map(|r| {
                let support = histogram[r - 1] + histogram[r] + histogram[r + 1];
                (r, support)
            })
            .max_by_key(|&(_, support)| support)
            .filter(|&(_, support)| support > 0)
            .map(|(r, support)| {
                let circumference = 2.0 * std::f64::consts::PI * r as f64;
                (r as f64, support as f64 / circumference)
            })
    }
}

impl PrimitiveDetector for GradientCircleDetector {
    fn name(&self) -> &'static str {
        "circles"
    }

    fn detect(&self, image: &GrayImage) -> Result<Vec<Primitive>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 || self.min_radius == 0 || self.min_radius > self.max_radius {
            return Ok(Vec::new());
        }

        let points = self.edge_points(image);
        let (w, h) = (width as usize, height as usize);
        let mut accumulator = vec![0u32; w * h];

        for point in &points {
            for r in self.min_radius..=self.max_radius {
                let r = r as f64;
                for sign in [-1.0, 1.0] {
                    let cx = (point.x + sign * r * point.ux).round();
                    let cy = (point.y + sign * r * point.uy).round();
                    if cx >= 0.0 && cy >= 0.0 && (cx as usize) < w && (cy as usize) < h {
                        accumulator[cy as usize * w + cx as usize] += 1;
                    }
                }
            }
        }

        // Local maxima scored by their 3x3 neighbourhood
        let mut candidates = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let votes = accumulator[y * w + x];
                if votes == 0 {
                    continue;
                }
                let mut score = 0u32;
                let mut is_peak = true;
                for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                        let neighbour = accumulator[ny * w + nx];
                        score += neighbour;
                        if neighbour > votes {
                            is_peak = false;
                        }
                    }
                }
                if is_peak && score >= self.accumulator_threshold {
                    candidates.push((score, x as f64, y as f64));
                }
            }
        }
        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        debug!("Circle accumulator produced {} candidate centres", candidates.len());

        let mut circles: Vec<CirclePrimitive> = Vec::new();
        for (_, cx, cy) in candidates {
            let crowded = circles.iter().any(|c| {
                (c.center[0] - cx).hypot(c.center[1] - cy) < self.min_center_distance
            });
            if crowded {
                continue;
            }
            if let Some((radius, support)) = self.fit_radius(&points, cx, cy) {
                if support >= self.min_rim_support {
                    circles.push(CirclePrimitive::new([cx, cy], radius));
                }
            }
        }

        Ok(circles.into_iter().map(Primitive::Circle).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_circle_mut;

    fn edge_point(x: f64, y: f64) -> EdgePoint {
        EdgePoint { x, y, ux: 1.0, uy: 0.0 }
    }

    #[test]
    fn test_radius_fit_only_reads_the_window() {
        let mut points: Vec<EdgePoint> = (0..400)
            .flat_map(|y| (0..400).step_by(7).map(move |x| edge_point(x as f64, y as f64)))
            .collect();
        points.sort_by(|a, b| a.y.total_cmp(&b.y));

        let nearby: Vec<&EdgePoint> = GradientCircleDetector::nearby_points(&points, 50.0, 60.0, 10.0).collect();
        assert!(!nearby.is_empty());
        assert!(nearby
            .iter()
            .all(|p| (p.x - 50.0).abs() <= 10.0 && (p.y - 60.0).abs() <= 10.0));
        let expected = points
            .iter()
            .filter(|p| (p.x - 50.0).abs() <= 10.0 && (p.y - 60.0).abs() <= 10.0)
            .count();
        assert_eq!(nearby.len(), expected);
    }

    #[test]
    fn test_detects_filled_disk() {
        let mut img = GrayImage::new(200, 200);
        draw_filled_circle_mut(&mut img, (100, 100), 40, Luma([255u8]));

        let primitives = GradientCircleDetector::default()
            .detect(&img)
            .expect("Should detect circles");

        let found = primitives.iter().any(|p| match p {
            Primitive::Circle(c) => {
                (c.center[0] - 100.0).abs() <= 3.0
                    && (c.center[1] - 100.0).abs() <= 3.0
                    && (c.radius - 40.0).abs() <= 3.0
            }
            _ => false,
        });
        assert!(found, "expected a circle near (100, 100) r=40, got {primitives:?}");
    }

    #[test]
    fn test_blank_page_has_no_circles() {
        let img = GrayImage::new(80, 80);
        let primitives = GradientCircleDetector::default()
            .detect(&img)
            .expect("Should run detector");
        assert!(primitives.is_empty());
    }

    #[test]
    fn test_invalid_radius_range_yields_nothing() {
        let mut img = GrayImage::new(100, 100);
        draw_filled_circle_mut(&mut img, (50, 50), 20, Luma([255u8]));

        let detector = GradientCircleDetector {
            min_radius: 50,
            max_radius: 10,
            ..Default::default()
        };
        assert!(detector.detect(&img).expect("Should run detector").is_empty());
    }
}
