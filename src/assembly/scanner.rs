//! Row window scanner
//!
//! Slides a fixed-height, full-width window down the page. Each non-blank
//! window is recognized once per segmentation mode and the best-scoring
//! reading is kept.

use serde::Serialize;
use tracing::{debug, warn};

use super::text::{clean_word_repetitions, text_len};
use crate::error::{EngineError, InputError};
use crate::source::{mean_intensity, PageImage};
use crate::vision::{confident_boxes, BoxRecognizer, RecognitionConfig, SegmentationMode};
use crate::visualize::{HighlightRegion, VisualizationSink};

/// Best reading of one scan window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowResult {
    /// Top of the window in page pixels
    pub y_offset: u32,
    /// Cleaned text, never empty
    pub text: String,
    /// Reference to the persisted window visualization, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<String>,
}

/// Parameters of one scan at a fixed window height
#[derive(Debug, Clone)]
pub struct ScanParams {
    pub window_height: u32,
    pub overlap: u32,
    pub min_confidence: f32,
    pub blank_threshold: f32,
    pub modes: Vec<SegmentationMode>,
}

/// Outcome of scanning a page at one window height
#[derive(Debug, Default)]
pub struct RowScan {
    /// Text-bearing windows, ordered by `y_offset`
    pub rows: Vec<RowResult>,
    /// Number of windows visited
    pub windows: usize,
    /// Windows skipped as blank
    pub blank_windows: usize,
    /// Windows that were recognized; numbers the per-window visualizations
    pub text_windows: usize,
    /// Recognition calls issued
    pub attempts: usize,
    /// Recognition calls that failed
    pub failures: usize,
    /// Most recent recognition failure
    pub last_error: Option<EngineError>,
    /// Composite visualization of all text-bearing windows
    pub composite: Option<String>,
}

impl RowScan {
    /// True when recognition was attempted and every attempt failed
    pub fn all_failed(&self) -> bool {
        self.attempts > 0 && self.failures == self.attempts
    }
}

/// Start offsets of the scan windows
///
/// Windows advance by `window_height - overlap` while the start lies above
/// `image_height - overlap`; later windows would sit entirely inside the
/// previous one. The first window always exists.
pub fn window_starts(image_height: u32, window_height: u32, overlap: u32) -> Result<Vec<u32>, InputError> {
    if window_height == 0 {
        return Err(InputError::InvalidOptions("window height must be positive".to_string()));
    }
    if overlap >= window_height {
        return Err(InputError::InvalidOptions(format!(
            "overlap {} must be smaller than window height {}",
            overlap, window_height
        )));
    }

    let step = (window_height - overlap) as usize;
    let limit = image_height.saturating_sub(overlap).max(1);
    Ok((0..limit).step_by(step).collect())
}

/// Score of one reading: `text length x average confidence`
fn reading_score(text: &str, confidences: &[f32]) -> f64 {
    if confidences.is_empty() {
        return 0.0;
    }
    let avg = confidences.iter().map(|&c| c as f64).sum::<f64>() / confidences.len() as f64;
    text_len(text) as f64 * avg
}

/// Scan `page` with the given parameters
pub fn scan_rows<R: BoxRecognizer + ?Sized>(
    page: &PageImage,
    recognizer: &R,
    params: &ScanParams,
    sink: Option<&dyn VisualizationSink>,
) -> Result<RowScan, InputError> {
    let starts = window_starts(page.height(), params.window_height, params.overlap)?;
    let mut scan = RowScan::default();

    for y in starts {
        scan.windows += 1;
        let strip = page.strip(y, params.window_height);

        let brightness = mean_intensity(&strip);
        if brightness > params.blank_threshold {
            debug!("Window y={} skipped as blank (mean {:.1})", y, brightness);
            scan.blank_windows += 1;
            continue;
        }

        let index = scan.text_windows;
        scan.text_windows += 1;

        let visualization = sink.and_then(|sink| {
            let label = format!("h{}-row_{:03}", params.window_height, index);
            let region = HighlightRegion::band(page, y, params.window_height);
            persist_or_warn(sink, page, &[region], &label)
        });

        let mut best_text = String::new();
        let mut best_score = 0.0;

        for &mode in &params.modes {
            scan.attempts += 1;
            let config = RecognitionConfig::new(mode);
            let boxes = match recognizer.recognize_boxes(&strip, &config) {
                Ok(boxes) => boxes,
                Err(e) => {
                    warn!("Recognition failed for window y={} ({:?}): {}", y, mode, e);
                    scan.failures += 1;
                    scan.last_error = Some(e);
                    continue;
                }
            };

            let kept = confident_boxes(boxes, params.min_confidence);
            let text = kept.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(" ");
            let confidences: Vec<f32> = kept.iter().map(|b| b.confidence).collect();
            let score = reading_score(&text, &confidences);

            debug!("Window y={} {:?}: score {:.1} {:?}", y, mode, score, text);

            if score > best_score {
                best_score = score;
                best_text = text;
            }
        }

        if !best_text.is_empty() {
            scan.rows.push(RowResult {
                y_offset: y,
                text: clean_word_repetitions(&best_text),
                visualization,
            });
        }
    }

    if let Some(sink) = sink {
        if !scan.rows.is_empty() {
            let regions: Vec<HighlightRegion> = scan
                .rows
                .iter()
                .map(|r| HighlightRegion::band(page, r.y_offset, params.window_height))
                .collect();
            let label = format!("h{}-all_selected_rows", params.window_height);
            scan.composite = persist_or_warn(sink, page, &regions, &label);
        }
    }

    debug!(
        "Scan at height {}: {} windows, {} blank, {} rows, {}/{} attempts failed",
        params.window_height,
        scan.windows,
        scan.blank_windows,
        scan.rows.len(),
        scan.failures,
        scan.attempts
    );

    Ok(scan)
}

fn persist_or_warn(
    sink: &dyn VisualizationSink,
    page: &PageImage,
    regions: &[HighlightRegion],
    label: &str,
) -> Option<String> {
    match sink.persist(page, regions, label) {
        Ok(reference) => Some(reference),
        Err(e) => {
            warn!("Visualization {} not saved: {}", label, e);
            None
        }
    }
}

/// Suggest a window height from the median word height on the page
///
/// Uses words with confidence above 30, scales the median height by 2.5
/// and clamps to `[40, 200]`. Returns 100 when nothing usable is found.
pub fn suggest_window_height<R: BoxRecognizer + ?Sized>(page: &PageImage, recognizer: &R) -> u32 {
    const DEFAULT_HEIGHT: u32 = 100;

    let config = RecognitionConfig::new(SegmentationMode::AutoWithOsd);
    let boxes = match recognizer.recognize_boxes(page.pixels(), &config) {
        Ok(boxes) => boxes,
        Err(e) => {
            warn!("Window height detection failed, using {}: {}", DEFAULT_HEIGHT, e);
            return DEFAULT_HEIGHT;
        }
    };

    let mut heights: Vec<u32> = confident_boxes(boxes, 30.0).iter().map(|b| b.height).collect();
    if heights.is_empty() {
        return DEFAULT_HEIGHT;
    }
    heights.sort_unstable();

    let median = heights[heights.len() / 2];
    let suggested = ((median as f64 * 2.5) as u32).clamp(40, 200);
    debug!("Median word height {} -> window height {}", median, suggested);
    suggested
}
