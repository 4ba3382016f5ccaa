//! Page raster held in memory for the duration of one assembly call

use image::{imageops, GrayImage};

use crate::error::InputError;

/// A decoded, grayscale page
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Luma pixels, 0 = black, 255 = white
    pixels: GrayImage,
}

impl PageImage {
    /// Wrap a grayscale raster, rejecting empty images
    pub fn new(pixels: GrayImage) -> Result<Self, InputError> {
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(InputError::EmptyImage { width, height });
        }
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Get page dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Borrow the underlying raster
    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    /// Copy out a full-width horizontal strip covering `[y, min(y + height, page height))`
    pub fn strip(&self, y: u32, height: u32) -> GrayImage {
        self.region(0, y, self.width(), height)
    }

    /// Copy out a rectangle, clamped to the page bounds
    pub fn region(&self, x: u32, y: u32, width: u32, height: u32) -> GrayImage {
        let (img_w, img_h) = self.dimensions();

        let x = x.min(img_w);
        let y = y.min(img_h);
        let width = width.min(img_w.saturating_sub(x));
        let height = height.min(img_h.saturating_sub(y));

        imageops::crop_imm(&self.pixels, x, y, width, height).to_image()
    }

    /// Replace the raster with a processed copy of the same size
    pub fn map_pixels(&self, f: impl FnOnce(&GrayImage) -> GrayImage) -> Self {
        Self { pixels: f(&self.pixels) }
    }
}

/// Mean luma of a raster, 255.0 for an empty one
pub fn mean_intensity(image: &GrayImage) -> f32 {
    let count = image.width() as u64 * image.height() as u64;
    if count == 0 {
        return 255.0;
    }
    let sum: u64 = image.pixels().map(|p| p.0[0] as u64).sum();
    (sum as f64 / count as f64) as f32
}
