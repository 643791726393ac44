use image::{GrayImage, Luma};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use crate::{
    error::{DrawingError, Result},
    traits::ImagePreprocessor,
};

/// Settings for the standard preprocessing chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Median filter radius in pixels, 0 disables denoising
    pub median_radius: u32,
    /// Number of equalisation tiles along each axis
    pub tile_grid: u32,
    /// Histogram clip limit, relative to a flat histogram
    pub clip_limit: f32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            median_radius: 1,
            tile_grid: 8,
            clip_limit: 2.0,
        }
    }
}

impl PreprocessSettings {
    /// Denoise, equalise, binarise, then flip so ink becomes foreground
    pub fn chain(&self) -> Vec<Box<dyn ImagePreprocessor>> {
        let mut steps: Vec<Box<dyn ImagePreprocessor>> = Vec::new();
        if self.median_radius > 0 {
            steps.push(Box::new(MedianDenoise { radius: self.median_radius }));
        }
        steps.push(Box::new(TileEqualization {
            tiles_x: self.tile_grid,
            tiles_y: self.tile_grid,
            clip_limit: self.clip_limit,
        }));
        steps.push(Box::new(OtsuBinarization));
        steps.push(Box::new(InkForeground));
        steps
    }
}

fn ensure_not_empty(image: &GrayImage) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(DrawingError::EmptyImage {
            width: image.width(),
            height: image.height(),
        });
    }
    Ok(())
}

/// Median filter denoising
#[derive(Debug, Clone)]
pub struct MedianDenoise {
    pub radius: u32,
}

impl Default for MedianDenoise {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

impl ImagePreprocessor for MedianDenoise {
    fn name(&self) -> &'static str {
        "median_denoise"
    }

    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        ensure_not_empty(image)?;
        Ok(imageproc::filter::median_filter(image, self.radius, self.radius))
    }
}

/// Contrast-limited histogram equalisation over a tile grid.
///
/// Each tile gets its own clipped histogram mapping; pixels blend the
/// mappings of the four nearest tile centres bilinearly.
#[derive(Debug, Clone)]
pub struct TileEqualization {
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub clip_limit: f32,
}

impl Default for TileEqualization {
    fn default() -> Self {
        Self {
            tiles_x: 8,
            tiles_y: 8,
            clip_limit: 2.0,
        }
    }
}

impl TileEqualization {
    fn tile_mapping(&self, image: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) -> [u8; 256] {
        let mut histogram = [0u32; 256];
        for y in y0..y1 {
            for x in x0..x1 {
                histogram[image.get_pixel(x, y)[0] as usize] += 1;
            }
        }

        let pixels = (x1 - x0) * (y1 - y0);
        if self.clip_limit > 0.0 {
            let limit = ((self.clip_limit * pixels as f32 / 256.0) as u32).max(1);
            let mut excess = 0u32;
            for bin in histogram.iter_mut() {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let share = excess / 256;
            let remainder = (excess % 256) as usize;
            for (i, bin) in histogram.iter_mut().enumerate() {
                *bin += share + u32::from(i < remainder);
            }
        }

        let mut mapping = [0u8; 256];
        let mut cumulative = 0u32;
        for (value, count) in histogram.iter().enumerate() {
            cumulative += count;
            mapping[value] = ((cumulative as f64 * 255.0) / pixels as f64).round().min(255.0) as u8;
        }
        mapping
    }
}

impl ImagePreprocessor for TileEqualization {
    fn name(&self) -> &'static str {
        "tile_equalization"
    }

    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        ensure_not_empty(image)?;
        if self.tiles_x == 0 || self.tiles_y == 0 {
            return Err(DrawingError::ImageProcessing(
                "equalisation tile grid must be at least 1x1".to_string(),
            ));
        }

        let (width, height) = image.dimensions();
        let tile_w = width.div_ceil(self.tiles_x.min(width));
        let tile_h = height.div_ceil(self.tiles_y.min(height));
        // Rounding up the tile size can leave fewer, but never empty, tiles
        let tiles_x = width.div_ceil(tile_w);
        let tiles_y = height.div_ceil(tile_h);

        let mut mappings = Vec::with_capacity((tiles_x * tiles_y) as usize);
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let x0 = tx * tile_w;
                let y0 = ty * tile_h;
                let x1 = ((tx + 1) * tile_w).min(width);
                let y1 = ((ty + 1) * tile_h).min(height);
                mappings.push(self.tile_mapping(image, x0, y0, x1, y1));
            }
        }

        // Fractional tile coordinate of a pixel, relative to tile centres
        let locate = |pos: u32, size: u32, count: u32| -> (usize, usize, f32) {
            let f = ((pos as f32 + 0.5) / size as f32 - 0.5).clamp(0.0, (count - 1) as f32);
            let lo = f.floor() as u32;
            let hi = (lo + 1).min(count - 1);
            (lo as usize, hi as usize, f - lo as f32)
        };

        let stride = tiles_x as usize;
        let mut output = GrayImage::new(width, height);
        for (x, y, pixel) in image.enumerate_pixels() {
            let value = pixel[0] as usize;
            let (x_lo, x_hi, wx) = locate(x, tile_w, tiles_x);
            let (y_lo, y_hi, wy) = locate(y, tile_h, tiles_y);

            let top = mappings[y_lo * stride + x_lo][value] as f32 * (1.0 - wx)
                + mappings[y_lo * stride + x_hi][value] as f32 * wx;
            let bottom = mappings[y_hi * stride + x_lo][value] as f32 * (1.0 - wx)
                + mappings[y_hi * stride + x_hi][value] as f32 * wx;
            let blended = top * (1.0 - wy) + bottom * wy;

            output.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
        }

        Ok(output)
    }
}

/// Global threshold at the Otsu level
#[derive(Debug, Clone, Default)]
pub struct OtsuBinarization;

impl ImagePreprocessor for OtsuBinarization {
    fn name(&self) -> &'static str {
        "otsu_binarization"
    }

    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        ensure_not_empty(image)?;

        // A uniform page has no ink to separate
        let first = image.get_pixel(0, 0)[0];
        if image.pixels().all(|p| p[0] == first) {
            return Ok(GrayImage::from_pixel(image.width(), image.height(), Luma([255u8])));
        }

        let level = imageproc::contrast::otsu_level(image);
        Ok(imageproc::contrast::threshold(
            image,
            level,
            imageproc::contrast::ThresholdType::Binary,
        ))
    }
}

/// Turn dark-on-light binary pages into ink-as-foreground
#[derive(Debug, Clone, Default)]
pub struct InkForeground;

impl ImagePreprocessor for InkForeground {
    fn name(&self) -> &'static str {
        "ink_foreground"
    }

    fn preprocess(&self, image: &GrayImage) -> Result<GrayImage> {
        let mut inverted = image.clone();
        image::imageops::invert(&mut inverted);
        Ok(inverted)
    }
}
