//! Vision/OCR Layer
//!
//! Boundary to the word-level recognition engine. The pipeline only sees
//! strongly-typed [`WordBox`] values; engine adapters translate whatever
//! the engine emits at this boundary.
//! Supported engines:
//! - Tesseract via its command-line interface

pub mod preprocess;
pub mod tesseract;

pub use preprocess::binarize;
pub use tesseract::TesseractCli;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Page segmentation strategy requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    /// Fully automatic segmentation with orientation detection
    AutoWithOsd,
    /// Fully automatic segmentation
    Auto,
    /// A single uniform block of text
    Block,
    /// A single text line
    SingleLine,
}

impl SegmentationMode {
    /// Tesseract `--psm` value for this mode
    pub fn psm(self) -> u32 {
        match self {
            SegmentationMode::AutoWithOsd => 1,
            SegmentationMode::Auto => 3,
            SegmentationMode::Block => 6,
            SegmentationMode::SingleLine => 7,
        }
    }
}

/// Configuration for one recognition call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    /// Segmentation strategy
    pub mode: SegmentationMode,
}

impl RecognitionConfig {
    pub fn new(mode: SegmentationMode) -> Self {
        Self { mode }
    }
}

/// A recognized word with its rectangle and confidence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordBox {
    /// Left edge in pixels
    pub x: u32,
    /// Top edge in pixels
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Recognized text, trimmed and never empty
    pub text: String,
    /// Recognition confidence (0.0 - 100.0)
    pub confidence: f32,
}

impl WordBox {
    /// Build a box, returning `None` when the text is blank after trimming
    pub fn new(x: u32, y: u32, width: u32, height: u32, text: &str, confidence: f32) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            x,
            y,
            width,
            height,
            text: text.to_string(),
            confidence: confidence.clamp(0.0, 100.0),
        })
    }
}

/// Word-level recognition engine
///
/// Calls are synchronous and may be slow. Implementations must not keep
/// per-call state that would make repeated calls on the same input diverge,
/// since the pipeline compares scores across calls.
pub trait BoxRecognizer {
    /// Recognize individual words in `image`
    fn recognize_boxes(
        &self,
        image: &GrayImage,
        config: &RecognitionConfig,
    ) -> Result<Vec<WordBox>, EngineError>;

    /// Recognize the whole image as plain text, preserving the engine's line breaks
    fn recognize_full_text(
        &self,
        image: &GrayImage,
        config: &RecognitionConfig,
    ) -> Result<String, EngineError>;
}

/// Keep only boxes whose confidence is strictly above `min_confidence`
pub fn confident_boxes(boxes: Vec<WordBox>, min_confidence: f32) -> Vec<WordBox> {
    boxes
        .into_iter()
        .filter(|b| b.confidence > min_confidence)
        .collect()
}
