//! Image Source Layer
//!
//! Decodes page rasters from disk. Decoding itself is delegated to the
//! `image` crate; this layer only turns the result into a [`PageImage`]
//! and maps failures onto [`InputError`].

pub mod page;

pub use page::{mean_intensity, PageImage};

use std::path::Path;
use tracing::debug;

use crate::error::InputError;

/// Anything that can produce a grayscale page from a path
pub trait ImageSource {
    fn load(&self, path: &Path) -> Result<PageImage, InputError>;
}

/// Decodes files with the `image` crate and converts them to luma
#[derive(Debug, Default, Clone, Copy)]
pub struct FileImageSource;

impl ImageSource for FileImageSource {
    fn load(&self, path: &Path) -> Result<PageImage, InputError> {
        if !path.exists() {
            return Err(InputError::NotFound(path.to_path_buf()));
        }

        let decoded = image::open(path).map_err(|source| InputError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let luma = decoded.to_luma8();
        debug!("Decoded {:?}: {}x{}", path, luma.width(), luma.height());

        PageImage::new(luma)
    }
}
