//! Image preprocessing before recognition
//!
//! Pages are binarized so that near-white paper becomes pure white. This
//! improves engine accuracy and lets blank-window detection work on
//! exact intensities.

use imageproc::contrast::{threshold, ThresholdType};
use tracing::debug;

use crate::source::PageImage;

/// Binarize a page: pixels brighter than `level` become 255, all others 0
pub fn binarize(page: &PageImage, level: u8) -> PageImage {
    debug!("Binarizing {}x{} page at level {}", page.width(), page.height(), level);
    page.map_pixels(|pixels| threshold(pixels, level, ThresholdType::Binary))
}

/// Apply the configured binarization, if any
pub fn prepare_page(page: &PageImage, binarize_threshold: Option<u8>) -> PageImage {
    match binarize_threshold {
        Some(level) => binarize(page, level),
        None => page.clone(),
    }
}
