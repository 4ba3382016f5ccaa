//! Visualization Layer
//!
//! Optional side channel that persists copies of a page with scanned
//! regions highlighted. The assembly core only passes the returned
//! references back to its caller.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::PathBuf;
use tracing::debug;

use crate::error::AssemblyError;
use crate::source::PageImage;
use crate::vision::WordBox;

const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Blend factor of the highlight fill
const HIGHLIGHT_ALPHA: f32 = 0.3;

/// Border thickness in pixels
const BORDER_THICKNESS: u32 = 2;

/// Rectangle to highlight, in page pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl HighlightRegion {
    /// Full-width band covering `[y, min(y + height, page height))`
    pub fn band(page: &PageImage, y: u32, height: u32) -> Self {
        let y = y.min(page.height());
        Self {
            x: 0,
            y,
            width: page.width(),
            height: height.min(page.height() - y),
        }
    }

    /// Rectangle of a recognized word
    pub fn from_word(word: &WordBox) -> Self {
        Self {
            x: word.x,
            y: word.y,
            width: word.width,
            height: word.height,
        }
    }
}

/// Destination for annotated page images
pub trait VisualizationSink {
    /// Persist `page` with `regions` highlighted under the given label and
    /// return a reference to the stored artifact
    fn persist(
        &self,
        page: &PageImage,
        regions: &[HighlightRegion],
        label: &str,
    ) -> Result<String, AssemblyError>;
}

/// Writes annotated PNG files into a directory
#[derive(Debug, Clone)]
pub struct FileVisualizationSink {
    dir: PathBuf,
}

impl FileVisualizationSink {
    /// Create a sink writing into `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, AssemblyError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            AssemblyError::Visualization(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    /// Get the output directory
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

impl VisualizationSink for FileVisualizationSink {
    fn persist(
        &self,
        page: &PageImage,
        regions: &[HighlightRegion],
        label: &str,
    ) -> Result<String, AssemblyError> {
        let annotated = annotate(page, regions);
        let path = self.dir.join(format!("{}.png", sanitize_label(label)));

        annotated.save(&path).map_err(|e| {
            AssemblyError::Visualization(format!("cannot write {}: {}", path.display(), e))
        })?;

        debug!("Saved visualization {:?} ({} regions)", path, regions.len());
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Prefixes every label so several pages can share one sink
pub struct PrefixedSink<'a> {
    inner: &'a dyn VisualizationSink,
    prefix: String,
}

impl<'a> PrefixedSink<'a> {
    pub fn new(inner: &'a dyn VisualizationSink, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }
}

impl VisualizationSink for PrefixedSink<'_> {
    fn persist(
        &self,
        page: &PageImage,
        regions: &[HighlightRegion],
        label: &str,
    ) -> Result<String, AssemblyError> {
        self.inner
            .persist(page, regions, &format!("{}-{}", self.prefix, label))
    }
}

/// Draw translucent filled highlights with a solid border onto an RGB copy of the page
pub fn annotate(page: &PageImage, regions: &[HighlightRegion]) -> RgbImage {
    let mut canvas = DynamicImage::ImageLuma8(page.pixels().clone()).to_rgb8();
    let (img_w, img_h) = canvas.dimensions();

    for region in regions {
        let x_end = (region.x + region.width).min(img_w);
        let y_end = (region.y + region.height).min(img_h);
        if region.x >= x_end || region.y >= y_end {
            continue;
        }

        for y in region.y..y_end {
            for x in region.x..x_end {
                let pixel = canvas.get_pixel_mut(x, y);
                for c in 0..3 {
                    let blended = pixel.0[c] as f32 * (1.0 - HIGHLIGHT_ALPHA)
                        + HIGHLIGHT_COLOR.0[c] as f32 * HIGHLIGHT_ALPHA;
                    pixel.0[c] = blended.clamp(0.0, 255.0) as u8;
                }
            }
        }

        for inset in 0..BORDER_THICKNESS {
            let w = (x_end - region.x).saturating_sub(2 * inset);
            let h = (y_end - region.y).saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut canvas, rect, HIGHLIGHT_COLOR);
        }
    }

    canvas
}

/// Keep labels usable as file names
fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
