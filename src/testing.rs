//! Scripted collaborators and synthetic pages for unit tests

use image::{GrayImage, Luma};
use std::cell::{Cell, RefCell};

use crate::error::{AssemblyError, EngineError};
use crate::source::PageImage;
use crate::vision::{BoxRecognizer, RecognitionConfig, SegmentationMode, WordBox};
use crate::visualize::{HighlightRegion, VisualizationSink};

/// A word box with confidence 90 and a width derived from its text
pub(crate) fn word(x: u32, y: u32, height: u32, text: &str) -> WordBox {
    WordBox {
        x,
        y,
        width: 10 * text.chars().count() as u32,
        height,
        text: text.to_string(),
        confidence: 90.0,
    }
}

pub(crate) fn white_page(width: u32, height: u32) -> PageImage {
    PageImage::new(GrayImage::from_pixel(width, height, Luma([255]))).unwrap()
}

/// A horizontal text band drawn as a solid run of `shade` rows
#[derive(Debug, Clone)]
pub(crate) struct Band {
    pub top: u32,
    pub height: u32,
    pub shade: u8,
    pub words: &'static [&'static str],
}

impl Band {
    pub(crate) fn new(top: u32, height: u32, shade: u8, words: &'static [&'static str]) -> Self {
        Self {
            top,
            height,
            shade,
            words,
        }
    }

    fn line(&self) -> String {
        self.words.join(" ")
    }
}

/// White page with each band painted across all but a 10px margin
pub(crate) fn banded_page(width: u32, height: u32, bands: &[Band]) -> PageImage {
    let mut pixels = GrayImage::from_pixel(width, height, Luma([255]));
    for band in bands {
        for y in band.top..(band.top + band.height).min(height) {
            for x in 10..width.saturating_sub(10) {
                pixels.put_pixel(x, y, Luma([band.shade]));
            }
        }
    }
    PageImage::new(pixels).unwrap()
}

fn scripted_failure() -> EngineError {
    EngineError::Exit {
        status: "exit status: 1".to_string(),
        stderr: "scripted failure".to_string(),
    }
}

/// Reads a band only when all of its rows are inside the image it is given
pub(crate) struct BandRecognizer {
    bands: Vec<Band>,
    box_calls: Cell<usize>,
}

impl BandRecognizer {
    pub(crate) fn new(bands: &[Band]) -> Self {
        Self {
            bands: bands.to_vec(),
            box_calls: Cell::new(0),
        }
    }

    pub(crate) fn box_calls(&self) -> usize {
        self.box_calls.get()
    }

    /// Bands whose full run of rows appears in `image`, with their top row
    fn visible_bands(&self, image: &GrayImage) -> Vec<(u32, &Band)> {
        let x = image.width() / 2;
        let mut found = Vec::new();
        let mut row = 0;

        while row < image.height() {
            let shade = image.get_pixel(x, row).0[0];
            let start = row;
            while row < image.height() && image.get_pixel(x, row).0[0] == shade {
                row += 1;
            }
            if let Some(band) = self
                .bands
                .iter()
                .find(|b| b.shade == shade && b.height == row - start)
            {
                found.push((start, band));
            }
        }

        found
    }
}

impl BoxRecognizer for BandRecognizer {
    fn recognize_boxes(
        &self,
        image: &GrayImage,
        _config: &RecognitionConfig,
    ) -> Result<Vec<WordBox>, EngineError> {
        self.box_calls.set(self.box_calls.get() + 1);
        Ok(self
            .visible_bands(image)
            .into_iter()
            .flat_map(|(top, band)| {
                band.words.iter().enumerate().map(move |(i, text)| WordBox {
                    x: 20 + i as u32 * 60,
                    y: top,
                    width: 50,
                    height: band.height,
                    text: text.to_string(),
                    confidence: 90.0,
                })
            })
            .collect())
    }

    fn recognize_full_text(
        &self,
        image: &GrayImage,
        _config: &RecognitionConfig,
    ) -> Result<String, EngineError> {
        Ok(self
            .visible_bands(image)
            .iter()
            .map(|(_, band)| band.line())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

enum FullText {
    FromBoxes,
    Fixed(String),
    Failing,
}

/// Returns canned boxes regardless of the image, optionally per mode
pub(crate) struct ScriptedRecognizer {
    boxes: Vec<WordBox>,
    per_mode: Vec<(SegmentationMode, Option<Vec<WordBox>>)>,
    fail_boxes: bool,
    full_text: FullText,
    box_calls: Cell<usize>,
    text_calls: Cell<usize>,
}

impl ScriptedRecognizer {
    pub(crate) fn boxes(boxes: Vec<WordBox>) -> Self {
        Self {
            boxes,
            per_mode: Vec::new(),
            fail_boxes: false,
            full_text: FullText::FromBoxes,
            box_calls: Cell::new(0),
            text_calls: Cell::new(0),
        }
    }

    /// Box recognition fails in every mode
    pub(crate) fn failing() -> Self {
        Self {
            fail_boxes: true,
            ..Self::boxes(Vec::new())
        }
    }

    pub(crate) fn with_mode(mut self, mode: SegmentationMode, boxes: Vec<WordBox>) -> Self {
        self.per_mode.push((mode, Some(boxes)));
        self
    }

    pub(crate) fn failing_mode(mut self, mode: SegmentationMode) -> Self {
        self.per_mode.push((mode, None));
        self
    }

    pub(crate) fn with_full_text(mut self, text: &str) -> Self {
        self.full_text = FullText::Fixed(text.to_string());
        self
    }

    pub(crate) fn failing_full_text(mut self) -> Self {
        self.full_text = FullText::Failing;
        self
    }

    pub(crate) fn box_calls(&self) -> usize {
        self.box_calls.get()
    }

    pub(crate) fn text_calls(&self) -> usize {
        self.text_calls.get()
    }
}

impl BoxRecognizer for ScriptedRecognizer {
    fn recognize_boxes(
        &self,
        _image: &GrayImage,
        config: &RecognitionConfig,
    ) -> Result<Vec<WordBox>, EngineError> {
        self.box_calls.set(self.box_calls.get() + 1);

        if let Some((_, scripted)) = self.per_mode.iter().rev().find(|(m, _)| *m == config.mode) {
            return scripted.clone().ok_or_else(scripted_failure);
        }
        if self.fail_boxes {
            return Err(scripted_failure());
        }
        Ok(self.boxes.clone())
    }

    fn recognize_full_text(
        &self,
        _image: &GrayImage,
        _config: &RecognitionConfig,
    ) -> Result<String, EngineError> {
        self.text_calls.set(self.text_calls.get() + 1);

        match &self.full_text {
            FullText::FromBoxes => Ok(self
                .boxes
                .iter()
                .map(|b| b.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")),
            FullText::Fixed(text) => Ok(text.clone()),
            FullText::Failing => Err(scripted_failure()),
        }
    }
}

/// Records labels instead of writing files; the label is the reference
#[derive(Default)]
pub(crate) struct RecordingSink {
    labels: RefCell<Vec<String>>,
    regions: RefCell<Vec<Vec<HighlightRegion>>>,
}

impl RecordingSink {
    pub(crate) fn labels(&self) -> Vec<String> {
        self.labels.borrow().clone()
    }

    pub(crate) fn regions(&self) -> Vec<Vec<HighlightRegion>> {
        self.regions.borrow().clone()
    }
}

impl VisualizationSink for RecordingSink {
    fn persist(
        &self,
        _page: &PageImage,
        regions: &[HighlightRegion],
        label: &str,
    ) -> Result<String, AssemblyError> {
        self.labels.borrow_mut().push(label.to_string());
        self.regions.borrow_mut().push(regions.to_vec());
        Ok(label.to_string())
    }
}
