//! Line assembly
//!
//! Groups word boxes into text lines by vertical proximity, then orders
//! each line left to right.

use tracing::debug;

use crate::error::EngineError;
use crate::source::PageImage;
use crate::vision::{confident_boxes, BoxRecognizer, RecognitionConfig, SegmentationMode, WordBox};

/// Words sharing one horizontal text band
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// Top of the box that opened this band
    pub y: u32,
    /// Top of the most recently joined box; the next box is compared against it
    pub anchor_y: u32,
    /// Member words, ordered by ascending `x`
    pub words: Vec<WordBox>,
}

impl TextLine {
    /// Member texts joined by single spaces
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Cluster boxes into lines, top to bottom
///
/// Boxes are sorted by `(y, x)`. A box joins the current line when
/// `|y - anchor_y| < 0.5 * height` and then becomes the anchor, so a line
/// follows a drifting baseline. Any other box opens a new line. Members are
/// re-sorted by `x` before emitting.
pub fn group_lines(boxes: &[WordBox]) -> Vec<TextLine> {
    let mut sorted: Vec<&WordBox> = boxes.iter().collect();
    sorted.sort_by_key(|b| (b.y, b.x));

    let mut lines: Vec<TextLine> = Vec::new();
    let mut current: Option<TextLine> = None;

    for word in sorted {
        let joins = current.as_ref().is_some_and(|line| {
            let dy = (word.y as f64 - line.anchor_y as f64).abs();
            dy < 0.5 * word.height as f64
        });

        match current.as_mut() {
            Some(line) if joins => {
                line.anchor_y = word.y;
                line.words.push(word.clone());
            }
            _ => {
                if let Some(done) = current.take() {
                    lines.push(finish_line(done));
                }
                current = Some(TextLine {
                    y: word.y,
                    anchor_y: word.y,
                    words: vec![word.clone()],
                });
            }
        }
    }

    if let Some(done) = current {
        lines.push(finish_line(done));
    }

    lines
}

fn finish_line(mut line: TextLine) -> TextLine {
    line.words.sort_by_key(|w| w.x);
    line
}

/// Assemble boxes into line strings, top to bottom
pub fn assemble_lines(boxes: &[WordBox]) -> Vec<String> {
    group_lines(boxes).iter().map(TextLine::text).collect()
}

/// One block-mode pass over the whole page, assembled into lines
///
/// Only boxes with confidence strictly above `min_confidence` are used.
pub fn extract_region_text<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    min_confidence: f32,
) -> Result<String, EngineError> {
    let config = RecognitionConfig::new(SegmentationMode::Block);
    let boxes = confident_boxes(recognizer.recognize_boxes(page.pixels(), &config)?, min_confidence);
    let lines = assemble_lines(&boxes);
    debug!("Region extraction: {} boxes in {} lines", boxes.len(), lines.len());
    Ok(lines.join("\n"))
}
